use crate::{
    config::UploadLimits,
    error::Error,
    extraction::Extractor,
    model::{ExtractionResult, UploadedFile},
    page::IndexPage,
};
use axum::{extract::Multipart, response::Html, Extension};
use bytes::BytesMut;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, trace};

const FILE_FIELD: &str = "file";

pub async fn index() -> Result<Html<String>, Error> {
    render(&IndexPage::form())
}

pub async fn process(
    Extension(extractor): Extension<Arc<dyn Extractor>>,
    Extension(limits): Extension<UploadLimits>,
    Extension(slots): Extension<Arc<Semaphore>>,
    mut multipart: Multipart,
) -> Result<Html<String>, Error> {
    let file = read_file_field(&mut multipart, limits.max_upload_bytes).await?;

    let _permit = slots
        .try_acquire()
        .map_err(|_| Error::ServiceUnavailable)?;

    let answer = extractor.extract(&file).await?;
    let result = ExtractionResult::from_model_output(&answer);

    info!(
        media_type = %file.media_type,
        bytes = file.bytes.len(),
        category = %result.category,
        "Extracted issue details"
    );

    render(&IndexPage::with_result(&result))
}

async fn read_file_field(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<UploadedFile, Error> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            trace!("Ignoring form field {:?}", field.name());
            continue;
        }

        let declared = field.content_type().map(str::to_owned);
        let mut buf = BytesMut::new();

        while let Some(maybe_chunk) = field.next().await {
            let chunk = maybe_chunk?;
            if buf.len() + chunk.len() > max_bytes {
                return Err(Error::BadRequest(format!(
                    "File exceeds the maximum size of {max_bytes} bytes"
                )));
            }
            buf.extend_from_slice(&chunk);
        }

        return UploadedFile::image(buf.freeze(), declared.as_deref());
    }

    Err(Error::BadRequest(format!("Missing form field `{FILE_FIELD}`")))
}

fn render(page: &IndexPage<'_>) -> Result<Html<String>, Error> {
    page.render_html()
        .map(Html)
        .map_err(|err| Error::Internal(format!("Could not render page: {err}")))
}
