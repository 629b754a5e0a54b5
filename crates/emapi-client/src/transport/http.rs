//! HTTP channel
//!
//! Sends SOAP requests over a dedicated reqwest client and tracks calls in
//! flight so a graceful close can wait for them to finish.

use super::{Channel, ChannelState, TransportConfig, tls};
use crate::endpoint::SubApi;
use crate::soap::{SoapRequest, XmlElement, decode_response, encode_request};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{CONTENT_TYPE, EXPECT};
use reqwest::{Client, Response};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, watch};
use tracing::{debug, trace, warn};
use url::Url;

/// Longest error body kept in [`Error::HttpStatus`]
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug)]
pub struct HttpChannel {
    sub_api: SubApi,
    address: Url,
    config: TransportConfig,
    client: Client,
    state: Mutex<ChannelState>,
    in_flight: AtomicUsize,
    drained: Notify,
    aborted: watch::Sender<bool>,
}

/// Decrements the in-flight count when a call finishes
struct CallGuard<'a> {
    channel: &'a HttpChannel,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.channel.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.channel.drained.notify_waiters();
        }
    }
}

impl HttpChannel {
    pub fn new(sub_api: SubApi, address: Url, config: TransportConfig, client: Client) -> Self {
        let (aborted, _) = watch::channel(false);
        Self {
            sub_api,
            address,
            config,
            client,
            state: Mutex::new(ChannelState::Opened),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
            aborted,
        }
    }

    /// Number of calls currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin_call(&self) -> Result<CallGuard<'_>> {
        let state = self.state.lock();
        if *state != ChannelState::Opened {
            return Err(Error::ChannelClosed {
                sub_api: self.sub_api,
                state: *state,
            });
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        Ok(CallGuard { channel: self })
    }

    async fn send(&self, request: SoapRequest) -> Result<XmlElement> {
        let spec = self.sub_api.spec();
        let encoded = encode_request(&request, spec, self.config.encoding)?;

        debug!(
            "{} {} -> {}",
            self.sub_api, request.operation, self.address
        );
        trace!("Request body: {} bytes", encoded.body.len());

        let mut builder = self
            .client
            .post(self.address.clone())
            .header(CONTENT_TYPE, encoded.content_type)
            .header("SOAPAction", format!("\"{}\"", spec.soap_action(&request.operation)))
            .body(encoded.body);

        if self.config.requires_tls() && tls::expect_continue() {
            builder = builder.header(EXPECT, "100-continue");
        }

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = self.read_body(response).await?;
        trace!("Response {}: {} bytes", status, body.len());

        if !status.is_success() {
            // SOAP 1.1 faults arrive with a 500 status
            if let Err(fault @ Error::Fault { .. }) =
                decode_response(content_type.as_deref(), &body)
            {
                return Err(fault);
            }
            let body: String = String::from_utf8_lossy(&body)
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            return Err(Error::HttpStatus { status, body });
        }

        decode_response(content_type.as_deref(), &body)
    }

    async fn read_body(&self, mut response: Response) -> Result<Vec<u8>> {
        let limit = self.config.max_message_size;
        if let Some(size) = response.content_length()
            && size > limit
        {
            return Err(Error::MessageTooLarge { size, limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let size = u64::try_from(body.len() + chunk.len()).unwrap_or(u64::MAX);
            if size > limit {
                return Err(Error::MessageTooLarge { size, limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn drain(&self) {
        loop {
            let notified = self.drained.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

async fn wait_aborted(mut aborted: watch::Receiver<bool>) {
    loop {
        if *aborted.borrow_and_update() {
            return;
        }
        if aborted.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

#[async_trait]
impl Channel for HttpChannel {
    fn sub_api(&self) -> SubApi {
        self.sub_api
    }

    fn address(&self) -> &Url {
        &self.address
    }

    fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    async fn invoke(&self, request: SoapRequest) -> Result<XmlElement> {
        let _guard = self.begin_call()?;
        let aborted = self.aborted.subscribe();

        tokio::select! {
            result = self.send(request) => result,
            () = wait_aborted(aborted) => Err(Error::ChannelAborted {
                sub_api: self.sub_api,
            }),
        }
    }

    async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                ChannelState::Closed => return Ok(()),
                ChannelState::Aborted => {
                    return Err(Error::ChannelAborted {
                        sub_api: self.sub_api,
                    });
                }
                ChannelState::Opened | ChannelState::Closing => *state = ChannelState::Closing,
            }
        }

        debug!(
            "Closing {} channel ({} call(s) in flight)",
            self.sub_api,
            self.in_flight()
        );
        let timeout = self.config.send_timeout;
        if tokio::time::timeout(timeout, self.drain()).await.is_err() {
            warn!(
                "{} channel still has {} call(s) in flight after {:?}",
                self.sub_api,
                self.in_flight(),
                timeout
            );
            return Err(Error::CloseTimeout {
                sub_api: self.sub_api,
                timeout,
            });
        }

        {
            let mut state = self.state.lock();
            if *state == ChannelState::Aborted {
                return Err(Error::ChannelAborted {
                    sub_api: self.sub_api,
                });
            }
            *state = ChannelState::Closed;
        }
        debug!("Closed {} channel", self.sub_api);
        Ok(())
    }

    fn abort(&self) {
        *self.state.lock() = ChannelState::Aborted;
        self.aborted.send_replace(true);
        self.drained.notify_waiters();
        debug!("Aborted {} channel", self.sub_api);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::endpoint::{AUTHENTICATE, MessageEncoding};
    use crate::transport::{SecurityMode, TlsVersion, build_http_client};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OK_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><PingResponse xmlns="http://ws.alterian.com/DMAuthenticate/"><PingResult>pong</PingResult></PingResponse></soap:Body></soap:Envelope>"#;

    fn channel(server: &MockServer, send_timeout: Duration) -> Arc<HttpChannel> {
        let mut config =
            TransportConfig::for_endpoint(&AUTHENTICATE, SecurityMode::None, TlsVersion::Tls12, true);
        config.send_timeout = send_timeout;
        let client = build_http_client(&config).unwrap();
        let address = Url::parse(&format!("{}/authenticate.asmx", server.uri())).unwrap();
        Arc::new(HttpChannel::new(SubApi::Authenticate, address, config, client))
    }

    #[tokio::test]
    async fn test_invoke_posts_soap_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authenticate.asmx"))
            .and(header(
                "SOAPAction",
                "\"http://ws.alterian.com/DMAuthenticate/Ping\"",
            ))
            .and(header("content-type", "text/xml; charset=utf-8"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/xml; charset=utf-8")
                    .set_body_string(OK_BODY),
            )
            .expect(1)
            .mount(&server)
            .await;

        let channel = channel(&server, Duration::from_secs(5));
        assert_eq!(channel.config().encoding, MessageEncoding::Text);

        let response = channel.invoke(SoapRequest::new("Ping")).await.unwrap();
        assert_eq!(response.required_child("PingResult").unwrap().text, "pong");
        assert_eq!(channel.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = channel(&server, Duration::from_secs(5))
            .invoke(SoapRequest::new("Ping"))
            .await
            .unwrap_err();
        match err {
            Error::HttpStatus { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body, "maintenance");
                assert!(Error::HttpStatus { status, body }.is_transient());
            }
            e => panic!("Expected HttpStatus, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_message_size_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(OK_BODY))
            .mount(&server)
            .await;

        let mut config =
            TransportConfig::for_endpoint(&AUTHENTICATE, SecurityMode::None, TlsVersion::Tls12, true)
                .with_max_message_size(16);
        config.send_timeout = Duration::from_secs(5);
        let client = build_http_client(&config).unwrap();
        let address = Url::parse(&server.uri()).unwrap();
        let channel = HttpChannel::new(SubApi::Authenticate, address, config, client);

        assert!(matches!(
            channel.invoke(SoapRequest::new("Ping")).await,
            Err(Error::MessageTooLarge { limit: 16, .. })
        ));
    }

    #[tokio::test]
    async fn test_close_rejects_new_calls() {
        let server = MockServer::start().await;
        let channel = channel(&server, Duration::from_secs(5));

        channel.close().await.unwrap();
        assert_eq!(channel.state(), ChannelState::Closed);
        channel.close().await.unwrap();

        match channel.invoke(SoapRequest::new("Ping")).await.unwrap_err() {
            Error::ChannelClosed { sub_api, state } => {
                assert_eq!(sub_api, SubApi::Authenticate);
                assert_eq!(state, ChannelState::Closed);
            }
            e => panic!("Expected ChannelClosed, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_times_out_then_abort_cancels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(OK_BODY)
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let channel = channel(&server, Duration::from_millis(100));
        let call = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.invoke(SoapRequest::new("Ping")).await })
        };
        while channel.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            channel.close().await,
            Err(Error::CloseTimeout { .. })
        ));
        assert_eq!(channel.state(), ChannelState::Closing);

        channel.abort();
        assert!(matches!(
            call.await.unwrap(),
            Err(Error::ChannelAborted { .. })
        ));
        assert_eq!(channel.state(), ChannelState::Aborted);
        assert_eq!(channel.in_flight(), 0);
        assert!(matches!(
            channel.close().await,
            Err(Error::ChannelAborted { .. })
        ));
    }
}
