//! pbuf registry client.
//!
//! A registry module is fetched with a single unary `PullModule` call. The
//! wire messages are declared here with prost derives; only the fields the
//! vendoring engine reads are modelled.

use super::{FetchedFile, ModuleSource, SourceFetcher};
use crate::auth::{CredentialLookup, registry_token};
use crate::config::{DEFAULT_REGISTRY_PORT, RegistryConfig};
use crate::error::{Result, VendorError};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::runtime::Runtime;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, info, warn};

/// Upper bound for one `PullModule` call.
pub const REGISTRY_TIMEOUT: Duration = Duration::from_secs(60);

const PULL_MODULE_PATH: &str = "/pbufregistry.v1.Registry/PullModule";

#[derive(Clone, PartialEq, prost::Message)]
pub struct PullModuleRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub tag: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoFile {
    #[prost(string, tag = "1")]
    pub filename: String,
    #[prost(string, tag = "2")]
    pub content: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PullModuleResponse {
    #[prost(message, repeated, tag = "2")]
    pub protofiles: Vec<ProtoFile>,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The registry's `PullModule` RPC, abstracted so tests can stand in for the
/// network.
pub trait RegistryTransport: Send + Sync {
    fn pull_module<'a>(
        &'a self,
        request: PullModuleRequest,
    ) -> BoxFuture<'a, std::result::Result<PullModuleResponse, tonic::Status>>;
}

/// gRPC transport over a lazily connected tonic channel.
#[derive(Clone)]
pub struct GrpcRegistryClient {
    channel: Channel,
    authorization: Option<AsciiMetadataValue>,
}

impl GrpcRegistryClient {
    /// Build a client without touching the network. Must be called inside a
    /// tokio runtime context.
    pub fn connect_lazy(config: &RegistryConfig, credentials: &dyn CredentialLookup) -> Result<Self> {
        let addr = canonicalize_addr(&config.addr);
        let endpoint = create_endpoint(&addr, config.insecure)?;

        let authorization = registry_token(credentials, &registry_host(&addr)).and_then(|token| {
            match AsciiMetadataValue::try_from(token.as_str()) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(error = %e, "registry token contains invalid characters, proceeding without auth");
                    None
                }
            }
        });
        if authorization.is_none() {
            debug!(addr = %addr, "no registry token found");
        }

        info!(addr = %addr, insecure = config.insecure, "using registry");
        Ok(Self {
            channel: endpoint.connect_lazy(),
            authorization,
        })
    }
}

impl RegistryTransport for GrpcRegistryClient {
    fn pull_module<'a>(
        &'a self,
        request: PullModuleRequest,
    ) -> BoxFuture<'a, std::result::Result<PullModuleResponse, tonic::Status>> {
        Box::pin(async move {
            let mut grpc = tonic::client::Grpc::new(self.channel.clone());
            grpc.ready()
                .await
                .map_err(|e| tonic::Status::unavailable(format!("registry not ready: {}", e)))?;

            let mut request = tonic::Request::new(request);
            request.set_timeout(REGISTRY_TIMEOUT);
            if let Some(value) = &self.authorization {
                request.metadata_mut().insert("authorization", value.clone());
            }

            let codec: ProstCodec<PullModuleRequest, PullModuleResponse> = ProstCodec::default();
            let response = grpc
                .unary(request, PathAndQuery::from_static(PULL_MODULE_PATH), codec)
                .await?;
            Ok(response.into_inner())
        })
    }
}

fn create_endpoint(addr: &str, insecure: bool) -> Result<Endpoint> {
    let uri = if insecure {
        format!("http://{}", addr)
    } else {
        format!("https://{}", addr)
    };

    let endpoint = Endpoint::from_shared(uri).map_err(|e| {
        VendorError::configuration("registry", format!("invalid address '{}': {}", addr, e))
    })?;

    if insecure {
        return Ok(endpoint);
    }
    endpoint
        .tls_config(ClientTlsConfig::new().with_native_roots())
        .map_err(|e| VendorError::configuration("registry", format!("TLS configuration error: {}", e)))
}

/// Fetches registry modules, one blocking call per module.
pub struct RegistryFetcher {
    transport: Box<dyn RegistryTransport>,
    runtime: Runtime,
    timeout: Duration,
}

impl RegistryFetcher {
    pub fn new(transport: impl RegistryTransport + 'static) -> Result<Self> {
        Ok(Self {
            transport: Box::new(transport),
            runtime: build_runtime()?,
            timeout: REGISTRY_TIMEOUT,
        })
    }

    /// Fetcher talking gRPC to the configured registry.
    pub fn connect(config: &RegistryConfig, credentials: &dyn CredentialLookup) -> Result<Self> {
        let runtime = build_runtime()?;
        let client = {
            let _guard = runtime.enter();
            GrpcRegistryClient::connect_lazy(config, credentials)?
        };
        Ok(Self {
            transport: Box::new(client),
            runtime,
            timeout: REGISTRY_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| VendorError::io("failed to start runtime for", "registry client", e))
}

impl SourceFetcher for RegistryFetcher {
    fn fetch(&self, source: &ModuleSource, _subtree: &str) -> Result<Vec<FetchedFile>> {
        let ModuleSource::Registry { name, tag } = source else {
            return Err(VendorError::configuration(
                source.to_string(),
                "not a registry module",
            ));
        };

        let request = PullModuleRequest {
            name: name.clone(),
            tag: tag.clone(),
        };
        let response = self
            .runtime
            .block_on(async {
                tokio::time::timeout(self.timeout, self.transport.pull_module(request)).await
            })
            .map_err(|_| VendorError::transport(source.to_string(), "deadline exceeded"))?
            .map_err(|status| {
                VendorError::transport(
                    source.to_string(),
                    format!("{:?}: {}", status.code(), status.message()),
                )
            })?;

        debug!(source = %source, files = response.protofiles.len(), "pulled module");
        Ok(response
            .protofiles
            .into_iter()
            .map(|file| FetchedFile::new(file.filename, file.content))
            .collect())
    }
}

/// Append the default registry port when the address has none.
pub fn canonicalize_addr(addr: &str) -> String {
    if split_port(addr).is_some() {
        addr.to_string()
    } else if addr.contains(':') && !addr.starts_with('[') {
        format!("[{}]:{}", addr, DEFAULT_REGISTRY_PORT)
    } else {
        format!("{}:{}", addr, DEFAULT_REGISTRY_PORT)
    }
}

/// Host part of a registry address; the credential lookup key.
pub fn registry_host(addr: &str) -> String {
    let host = split_port(addr).map_or(addr, |(host, _)| host);
    host.trim_start_matches('[').trim_end_matches(']').to_string()
}

fn split_port(addr: &str) -> Option<(&str, &str)> {
    let (host, port) = addr.rsplit_once(':')?;
    let bracketed = host.starts_with('[') && host.ends_with(']');
    if host.is_empty() || port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // a bare IPv6 address is all colons; only a bracketed one carries a port
    if host.contains(':') && !bracketed {
        return None;
    }
    Some((host, port))
}
