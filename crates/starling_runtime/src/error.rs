use deno_core::{
    error::{CoreError, JsError},
    serde_v8, v8,
};

/// Failures from the Rust→JS call helpers in [`crate::sys::js::class`]: a
/// global class, constructor, method or property that the glue JS was
/// expected to provide but didn't.
#[derive(Debug, thiserror::Error)]
pub enum WebSysError {
    #[error("class `{0}` not found on global scope")]
    ClassMissing(String),
    #[error("`new {0}(..)` did not return an object")]
    ConstructorFailed(String),
    #[error("method `{method_name}` missing on `{class_name}`")]
    MethodMissing {
        class_name: String,
        method_name: String,
    },
    #[error("call to `{0}` threw or did not return")]
    MethodCallFailed(String),
    #[error("property `{0}` missing")]
    PropertyMissing(String),
    #[error("failed to set property `{0}`")]
    PropertySetFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    DenoCore(#[from] CoreError),
    #[error(transparent)]
    SerdeV8(#[from] serde_v8::Error),
    #[error(transparent)]
    WebSys(#[from] WebSysError),
    #[error("expected a {0}")]
    TypeError(String),
    #[error("failed to allocate a {0} on the v8 heap")]
    AllocFailed(&'static str),
    #[error(transparent)]
    EventLoop(#[from] starling_core::Error),
}

impl RuntimeError {
    pub(crate) fn type_error(what: impl Into<String>) -> Self {
        Self::TypeError(what.into())
    }

    pub(crate) fn cannot_alloc(what: &'static str) -> Self {
        Self::AllocFailed(what)
    }
}

impl From<v8::DataError> for RuntimeError {
    fn from(data_error: v8::DataError) -> Self {
        Self::DenoCore(data_error.into())
    }
}

impl From<JsError> for RuntimeError {
    fn from(js_error: JsError) -> Self {
        Self::DenoCore(js_error.into())
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
