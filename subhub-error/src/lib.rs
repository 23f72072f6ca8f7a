pub mod ext;
pub mod status_code;

// Публичный экспорт всех типов и функций из вложенных модулей,
// чтобы упростить доступ к ним из внешнего кода.
pub use ext::*;
pub use status_code::*;
