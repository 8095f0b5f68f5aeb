use std::time::Duration;

use crate::{FaultKind, FetchError, FetchResponse, FetchTask};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub redirect_limit: usize,
    pub user_agent: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            redirect_limit: 5,
            user_agent: Some(concat!("pagestream/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

/// Asynchronous fetch capability used by the orchestrator.
///
/// A session is opened per batch (or once per run when reuse is enabled) and is borrowed by
/// every fetch of that batch.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Session: Send + Sync;

    fn open_session(&self) -> Result<Self::Session, FetchError>;

    async fn fetch(
        &self,
        session: &Self::Session,
        task: &FetchTask,
    ) -> Result<FetchResponse, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    settings: FetchSettings,
}

impl ReqwestTransport {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    type Session = reqwest::Client;

    fn open_session(&self) -> Result<Self::Session, FetchError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(
                self.settings.redirect_limit,
            ));
        if let Some(agent) = &self.settings.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder
            .build()
            .map_err(|err| FetchError::new(FaultKind::ConnectFailure, err.to_string()))
    }

    async fn fetch(
        &self,
        session: &Self::Session,
        task: &FetchTask,
    ) -> Result<FetchResponse, FetchError> {
        let parsed = reqwest::Url::parse(&task.url)
            .map_err(|err| FetchError::new(FaultKind::InvalidUrl, err.to_string()))?;

        let response = session
            .get(parsed)
            .headers(task.headers.clone())
            .timeout(task.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(FetchResponse {
            url: task.url.clone(),
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_connect() {
        return FetchError::new(FaultKind::ConnectFailure, err.to_string());
    }
    if err.is_timeout() {
        return FetchError::new(FaultKind::RequestTimeout, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FaultKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FaultKind::Disconnect, err.to_string())
}

/// Runs one fetch with its own deadline. Faults are returned as values, never raised.
pub(crate) async fn guarded_fetch<T: Transport>(
    transport: &T,
    session: &T::Session,
    task: FetchTask,
) -> (String, Result<FetchResponse, FetchError>) {
    let result = match tokio::time::timeout(task.timeout, transport.fetch(session, &task)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::new(
            FaultKind::RequestTimeout,
            format!("no response within {:?}", task.timeout),
        )),
    };
    (task.url, result)
}
