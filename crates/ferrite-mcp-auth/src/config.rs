/// Configuration for the bearer-verifier middleware: the required scopes
/// and the resource-metadata URL advertised in rejection challenges.
#[derive(Debug, Clone, Default)]
pub struct BearerAuthConfig {
    pub required_scopes: Vec<String>,
    pub resource_metadata_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BearerAuthConfigBuilder {
    config: BearerAuthConfig,
}

impl BearerAuthConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_required_scope(mut self, scope: impl Into<String>) -> Self {
        self.config.required_scopes.push(scope.into());
        self
    }

    pub fn with_resource_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.config.resource_metadata_url = Some(url.into());
        self
    }

    pub fn build(self) -> BearerAuthConfig {
        self.config
    }
}

/// How the outbound OAuth handshake resolves its own client identity with
/// the authorization server it's talking to, tried in this priority order:
/// a Client ID Metadata Document URL, pre-registered static credentials,
/// or RFC 7591 Dynamic Client Registration.
#[derive(Debug, Clone, Default)]
pub enum ClientRegistrationMode {
    /// A non-root HTTPS URL identifying the client, resolved as a Client ID
    /// Metadata Document (CIMD).
    Cimd(String),
    /// A `client_id` (and optional `client_secret`) already registered out
    /// of band with the authorization server.
    Static { client_id: String, client_secret: Option<String> },
    /// Attempt RFC 7591 Dynamic Client Registration against the
    /// authorization server's advertised `registration_endpoint`.
    #[default]
    Dynamic,
}

/// Configuration for the outbound OAuth authorization-code+PKCE handshake.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub registration: ClientRegistrationMode,
    pub client_name: String,
}

#[derive(Debug, Clone)]
pub struct OAuthClientConfigBuilder {
    redirect_uri: String,
    scopes: Vec<String>,
    registration: ClientRegistrationMode,
    client_name: String,
}

impl OAuthClientConfigBuilder {
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
            registration: ClientRegistrationMode::Dynamic,
            client_name: "ferrite-mcp".to_string(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn with_registration(mut self, mode: ClientRegistrationMode) -> Self {
        self.registration = mode;
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn build(self) -> OAuthClientConfig {
        OAuthClientConfig {
            redirect_uri: self.redirect_uri,
            scopes: self.scopes,
            registration: self.registration,
            client_name: self.client_name,
        }
    }
}
