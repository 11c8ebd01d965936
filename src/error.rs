use err_derive::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(display = "Combinatorial iterator needs at least one item")]
    EmptyItems,

    #[error(display = "Combinatorial iterator repeat count must be at least 1")]
    ZeroRepeat,

    #[error(display = "Repeat count {} exceeds item count {}", repeat, items)]
    RepeatExceedsItems { repeat: usize, items: usize },

    #[error(display = "Invalid config: {}", _0)]
    InvalidConfig(String),

    #[error(display = "Shape mismatch: {}", _0)]
    ShapeMismatch(String),

    #[error(display = "Inference Error: {}", _0)]
    InferenceError(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn inference<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::InferenceError(Box::new(err))
    }
}

#[test]
fn error_display_test() {
    let err = Error::RepeatExceedsItems { repeat: 3, items: 2 };
    assert_eq!(err.to_string(), "Repeat count 3 exceeds item count 2");

    let err = Error::InvalidConfig("kernel size must be odd".into());
    assert_eq!(err.to_string(), "Invalid config: kernel size must be odd");
}
