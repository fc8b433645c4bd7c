pub mod category;
pub mod request;
pub mod result;
pub mod settings;

pub use category::{ImageCategory, TextCategory, FILTERABLE_TEXT_CATEGORIES};
pub use request::{ContentType, ImageItem, Priority, ProcessingRequest, RequestHead, TextItem};
pub use result::{
    AckPayload, AnalysisResult, ErrorInfo, FilteredIndex, FlaggedRange, ImageAckItem,
    ImageAnalysisAck, ImageFinding, ProcessingResult, ProcessingStats, Region, TextAckItem,
    TextAnalysisAck, TextFinding,
};
pub use settings::{
    DisplayOption, FilterBlock, SettingsSavedAck, SettingsUpdateDoc, UserSettings,
};
