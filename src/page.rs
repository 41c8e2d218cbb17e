use crate::model::ExtractionResult;
use askama::Template;

#[derive(Template, Default)]
#[template(path = "index.html")]
pub struct IndexPage<'a> {
    pub result: Option<&'a ExtractionResult>,
    pub error: Option<&'a str>,
}

impl<'a> IndexPage<'a> {
    pub fn form() -> Self {
        Self::default()
    }

    pub fn with_result(result: &'a ExtractionResult) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn with_error(message: &'a str) -> Self {
        Self {
            result: None,
            error: Some(message),
        }
    }

    pub fn render_html(&self) -> askama::Result<String> {
        self.render()
    }
}
