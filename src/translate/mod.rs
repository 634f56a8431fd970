mod openai;
mod retry;

use anyhow::Result;
use futures_util::future::BoxFuture;

pub use openai::OpenAiTranslator;

/// Maps a source-language string to the target language.
pub trait Translator: Send + Sync {
    fn translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Returns the input unchanged; used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

impl Translator for PassthroughTranslator {
    fn translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(text.to_string()) })
    }
}

impl<T: Translator + ?Sized> Translator for std::sync::Arc<T> {
    fn translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String>> {
        (**self).translate(text)
    }
}

impl<T: Translator + ?Sized> Translator for Box<T> {
    fn translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String>> {
        (**self).translate(text)
    }
}
