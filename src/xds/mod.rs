pub mod conversion;

pub use conversion::{ConversionError, ProxyTranslation, ProxyTranslator, TranslatedProxy};
