use async_trait::async_trait;
use ckmailer_client_core::{
    FormBody, HttpCommandRequest, HttpResponse, RequestError, RequestTransport, WidgetConfig,
};
use reqwest::multipart::Form;

/// Native transport posting the same multipart bodies the browser sends.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    config: WidgetConfig,
}

impl ReqwestTransport {
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn url_for(&self, request: &HttpCommandRequest) -> String {
        self.config.endpoint_url(&request.endpoint)
    }
}

#[async_trait(?Send)]
impl RequestTransport for ReqwestTransport {
    async fn post(&self, request: &HttpCommandRequest) -> Result<HttpResponse, RequestError> {
        let url = self.url_for(request);
        tracing::debug!(endpoint = request.endpoint.name(), %url, "posting widget request");

        let mut builder = self.http.post(&url);
        if let Some(body) = request.body.as_ref() {
            builder = builder.multipart(multipart_form(body));
        }
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let raw = response.text().await.map_err(|error| RequestError::Decode {
            status,
            message: format!("failed to read response body: {error}"),
        })?;
        Ok(HttpResponse::new(status, raw))
    }
}

fn multipart_form(body: &FormBody) -> Form {
    body.fields().fold(Form::new(), |form, (name, value)| {
        form.text(name.to_string(), value.to_string())
    })
}

fn map_reqwest_error(error: reqwest::Error) -> RequestError {
    RequestError::transport(error.to_string())
}
