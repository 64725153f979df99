use super::*;

use async_trait::async_trait;
use ckmailer_client_core::{FormBody, HttpCommandRequest, HttpResponse, RequestTransport};
use gloo_net::http::Request;
use web_sys::FormData;

/// Browser transport. Bodies go out as `multipart/form-data`, matching what a
/// native `FormData` submit produces.
pub(super) struct GlooTransport {
    config: WidgetConfig,
}

impl GlooTransport {
    pub(super) fn new(config: WidgetConfig) -> Self {
        Self { config }
    }
}

#[async_trait(?Send)]
impl RequestTransport for GlooTransport {
    async fn post(&self, request: &HttpCommandRequest) -> Result<HttpResponse, RequestError> {
        let url = self.config.endpoint_url(&request.endpoint);
        tracing::debug!(endpoint = request.endpoint.name(), %url, "posting widget request");

        let builder = Request::post(&url);
        let response = match request.body.as_ref() {
            Some(body) => {
                let form = form_data(body)?;
                builder
                    .body(form)
                    .map_err(map_network_error)?
                    .send()
                    .await
                    .map_err(map_network_error)?
            }
            None => builder.send().await.map_err(map_network_error)?,
        };

        let status = response.status();
        let raw = response.text().await.map_err(|error| RequestError::Decode {
            status,
            message: format!("failed to read response body: {error}"),
        })?;
        Ok(HttpResponse::new(status, raw))
    }
}

pub(super) fn form_data(body: &FormBody) -> Result<FormData, RequestError> {
    let form = FormData::new()
        .map_err(|_| RequestError::transport("FormData is unavailable"))?;
    for (name, value) in body.fields() {
        form.append_with_str(name, value)
            .map_err(|_| RequestError::transport(format!("failed to append form field `{name}`")))?;
    }
    Ok(form)
}

pub(super) fn map_network_error(error: gloo_net::Error) -> RequestError {
    RequestError::transport(error.to_string())
}
