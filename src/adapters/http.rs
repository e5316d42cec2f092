use crate::domain::model::{HttpMethod, HttpResponse, MultipartForm, PartValue, PreparedRequest, RequestBody};
use crate::domain::ports::HttpTransport;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// 每次送出都重新建立 Form，reqwest 的 Form 無法 clone
    fn build_form(form: &MultipartForm) -> Result<Form> {
        let mut multipart = Form::new();
        for part in &form.parts {
            multipart = match &part.value {
                PartValue::Text(value) => multipart.text(part.name.clone(), value.clone()),
                PartValue::File(file) => {
                    let file_part = Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.mime_type)?;
                    multipart.part(part.name.clone(), file_part)
                }
            };
        }
        Ok(multipart)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        if let Some(headers) = &request.headers {
            for (name, value) in headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(form) => builder.multipart(Self::build_form(form)?),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        tracing::debug!("API response status: {} ({} bytes)", status, body.len());

        Ok(HttpResponse::new(status, body))
    }
}
