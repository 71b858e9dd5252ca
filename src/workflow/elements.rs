//! UI elements located by reference image.

use super::error::AutomationError;
use crate::config::Variant;
use crate::vision::TemplateError;
use image::GrayImage;
use std::collections::HashMap;
use std::path::PathBuf;

/// A control of the analysis application found by template matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    FolderPathField,
    FilenameField,
    OkChannelMap,
    AddButton,
    EventOk,
    /// Second confirmation of the event dialog (demo build only)
    EventOkSecond,
    ContinuePopup,
    SegmentTimeField,
    HrvCalibrationTab,
    CalculationEntire,
    LfField,
    HfField,
    RpeakTab,
    AdditionalSettingsTab,
    UseDefaultDirectory,
    FolderField,
    AnalyzeButton,
    EditRsButton,
    OutputFolderField,
    DemoMode,
    DemoContinue,
}

impl Element {
    pub const ALL: [Element; 21] = [
        Element::FolderPathField,
        Element::FilenameField,
        Element::OkChannelMap,
        Element::AddButton,
        Element::EventOk,
        Element::EventOkSecond,
        Element::ContinuePopup,
        Element::SegmentTimeField,
        Element::HrvCalibrationTab,
        Element::CalculationEntire,
        Element::LfField,
        Element::HfField,
        Element::RpeakTab,
        Element::AdditionalSettingsTab,
        Element::UseDefaultDirectory,
        Element::FolderField,
        Element::AnalyzeButton,
        Element::EditRsButton,
        Element::OutputFolderField,
        Element::DemoMode,
        Element::DemoContinue,
    ];

    /// Reference image file inside the templates directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Element::FolderPathField => "folder_path_field.png",
            Element::FilenameField => "filename_field.png",
            Element::OkChannelMap => "ok_channel_map.png",
            Element::AddButton => "add_button.png",
            Element::EventOk => "event_ok.png",
            Element::EventOkSecond => "event2_ok.png",
            Element::ContinuePopup => "continue_button.png",
            Element::SegmentTimeField => "segment_time_field.png",
            Element::HrvCalibrationTab => "hrv_calibration_tab.png",
            Element::CalculationEntire => "calculation_entire.png",
            Element::LfField => "lf_field.png",
            Element::HfField => "hf_field.png",
            Element::RpeakTab => "rpeak_tab.png",
            Element::AdditionalSettingsTab => "additional_settings_tab.png",
            Element::UseDefaultDirectory => "use_default_directory.png",
            Element::FolderField => "folder_field.png",
            Element::AnalyzeButton => "analyze_button.png",
            Element::EditRsButton => "edit_rs_button.png",
            Element::OutputFolderField => "output_folder_field.png",
            Element::DemoMode => "demo_mode.png",
            Element::DemoContinue => "continue.png",
        }
    }

    /// The button confirming the event dialog a second time.
    ///
    /// The licensed build shows the same button twice; the demo build
    /// renders a differently styled one.
    pub fn second_event_ok(variant: Variant) -> Element {
        match variant {
            Variant::Main => Element::EventOk,
            Variant::Demo => Element::EventOkSecond,
        }
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Element::FolderPathField => "folder path field",
            Element::FilenameField => "filename field",
            Element::OkChannelMap => "channel map OK",
            Element::AddButton => "Add (event channel)",
            Element::EventOk => "event OK",
            Element::EventOkSecond => "second event OK",
            Element::ContinuePopup => "continue pop-up",
            Element::SegmentTimeField => "segment time field",
            Element::HrvCalibrationTab => "HRV calculation tab",
            Element::CalculationEntire => "calculation entire",
            Element::LfField => "LF field",
            Element::HfField => "HF field",
            Element::RpeakTab => "R-peak tab",
            Element::AdditionalSettingsTab => "additional settings tab",
            Element::UseDefaultDirectory => "use default directory",
            Element::FolderField => "folder field",
            Element::AnalyzeButton => "Analyze",
            Element::EditRsButton => "Edit R's",
            Element::OutputFolderField => "export folder field",
            Element::DemoMode => "Demo Mode",
            Element::DemoContinue => "Continue",
        };
        write!(f, "{label}")
    }
}

/// Reference images, loaded on first use and kept as grayscale.
#[derive(Debug, Default)]
pub struct TemplateLibrary {
    dir: PathBuf,
    cache: HashMap<Element, GrayImage>,
}

impl TemplateLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    pub fn path_of(&self, element: Element) -> PathBuf {
        self.dir.join(element.file_name())
    }

    /// Use `template` for `element` instead of reading it from disk.
    pub fn insert(&mut self, element: Element, template: GrayImage) {
        self.cache.insert(element, template);
    }

    pub fn get(&mut self, element: Element) -> Result<&GrayImage, AutomationError> {
        if !self.cache.contains_key(&element) {
            let path = self.path_of(element);
            let template = image::open(&path)
                .map_err(|e| AutomationError::Image(format!("{}: {e}", path.display())))?
                .to_luma8();
            if template.width() == 0 || template.height() == 0 {
                return Err(AutomationError::Template(path, TemplateError::Empty));
            }
            self.cache.insert(element, template);
        }
        self.cache
            .get(&element)
            .ok_or_else(|| AutomationError::Image(format!("{element} not cached")))
    }

    /// Elements whose reference image is not present on disk.
    pub fn missing(&self, elements: &[Element]) -> Vec<Element> {
        elements
            .iter()
            .copied()
            .filter(|e| !self.cache.contains_key(e) && !self.path_of(*e).is_file())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_file_names_are_unique() {
        let mut names: Vec<_> = Element::ALL.iter().map(|e| e.file_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Element::ALL.len());
    }

    #[test]
    fn test_second_event_ok_per_variant() {
        assert_eq!(Element::second_event_ok(Variant::Main), Element::EventOk);
        assert_eq!(Element::second_event_ok(Variant::Demo), Element::EventOkSecond);
    }

    #[test]
    fn test_library_loads_and_caches() {
        let dir = std::env::temp_dir().join(format!("hrv-autopilot-templates-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut img = GrayImage::new(8, 6);
        img.put_pixel(3, 3, Luma([255]));
        img.save(dir.join(Element::AnalyzeButton.file_name())).unwrap();

        let mut library = TemplateLibrary::new(&dir);
        assert_eq!(library.get(Element::AnalyzeButton).unwrap().dimensions(), (8, 6));
        assert!(library.get(Element::AddButton).is_err());
        assert_eq!(
            library.missing(&[Element::AnalyzeButton, Element::AddButton]),
            vec![Element::AddButton]
        );

        library.insert(Element::AddButton, GrayImage::new(4, 4));
        assert!(library.get(Element::AddButton).is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
