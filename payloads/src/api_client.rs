use crate::{
    API_ROOT, FetchSpecification, build_details_url, build_fetch_url,
    requests, responses,
};
use reqwest::{RequestBuilder, StatusCode, header::AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Display;

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// An API client for interfacing with the remote platform API.
///
/// Paths passed to the helpers are absolute (`/api/v2/...`) and may carry
/// a query string; the client only prefixes its address.
#[derive(Clone)]
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
    /// Sent as `Authorization: Token <token>`. When absent the header is
    /// omitted entirely.
    pub token: Option<SecretString>,
}

/// Helper methods for http actions
impl APIClient {
    fn format_url(&self, path: &str) -> String {
        format!("{}{path}", self.address.trim_end_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(
                AUTHORIZATION,
                format!("Token {}", token.expose_secret()),
            ),
            None => request,
        }
    }

    async fn get(&self, path: &str) -> ReqwestResult {
        let request = self.inner_client.get(self.format_url(path));
        self.authorize(request).send().await
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        let request = self.inner_client.post(self.format_url(path)).json(body);
        self.authorize(request).send().await
    }

    async fn empty_post(&self, path: &str) -> ReqwestResult {
        let request = self.inner_client.post(self.format_url(path));
        self.authorize(request).send().await
    }

    async fn patch(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        let request =
            self.inner_client.patch(self.format_url(path)).json(body);
        self.authorize(request).send().await
    }

    async fn delete_request(&self, path: &str) -> ReqwestResult {
        let request = self.inner_client.delete(self.format_url(path));
        self.authorize(request).send().await
    }
}

/// Methods on the remote API
impl APIClient {
    /// Fetch one page of a collection.
    pub async fn list<T: DeserializeOwned>(
        &self,
        spec: &FetchSpecification,
    ) -> Result<responses::Paginated<T>, ClientError> {
        let response = self.get(&build_fetch_url(spec)).await?;
        ok_body(response).await
    }

    pub async fn details<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: impl Display,
        project_id: Option<&str>,
    ) -> Result<T, ClientError> {
        let url = build_details_url(collection, id, project_id);
        let response = self.get(&url).await?;
        ok_body(response).await
    }

    pub async fn create<B: Serialize, T: DeserializeOwned>(
        &self,
        collection: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response =
            self.post(&format!("{API_ROOT}/{collection}/"), body).await?;
        ok_body(response).await
    }

    /// Partially update a resource.
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        collection: &str,
        id: impl Display,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .patch(&build_details_url(collection, id, None), body)
            .await?;
        ok_body(response).await
    }

    pub async fn delete(
        &self,
        collection: &str,
        id: impl Display,
    ) -> Result<(), ClientError> {
        let response = self
            .delete_request(&build_details_url(collection, id, None))
            .await?;
        ok_empty(response).await
    }

    /// Trigger a server-side action on a resource, e.g. running a job.
    pub async fn action(
        &self,
        collection: &str,
        id: impl Display,
        action: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .empty_post(&format!("{API_ROOT}/{collection}/{id}/{action}/"))
            .await?;
        ok_empty(response).await
    }

    pub async fn login(
        &self,
        details: &requests::LoginCredentials,
    ) -> Result<responses::AuthToken, ClientError> {
        let response = self
            .post(&format!("{API_ROOT}/auth/token/login/"), details)
            .await?;
        ok_body(response).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let response = self
            .empty_post(&format!("{API_ROOT}/auth/token/logout/"))
            .await?;
        ok_empty(response).await
    }

    /// Get the user the current token belongs to.
    pub async fn current_user(
        &self,
    ) -> Result<responses::User, ClientError> {
        let response = self.get(&current_user_path()).await?;
        ok_body(response).await
    }
}

pub fn current_user_path() -> String {
    format!("{API_ROOT}/users/me/")
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing the raw response text.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
    /// A cached response did not have the type the caller expected.
    #[error("Unexpected response shape for {0}")]
    UnexpectedShape(String),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::APIError(status, _) => Some(*status),
            Self::Network(e) => e.status(),
            Self::UnexpectedShape(_) => None,
        }
    }

    pub fn is_authorization_denied(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        )
    }
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(())
}
