use crate::apis::to_params;
use crate::apis::types::{
    LoginResponse, PhoneLoginParams, QrCodeLoginParams, RegisterParams, UserInfo,
};
use crate::core::client::SignedClient;
use crate::core::errors::PipelineError;
use crate::core::session::SessionWriter;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

pub const PHONE_LOGIN: &str = "/api/user/phone-login";
pub const QRCODE_LOGIN: &str = "/api/user/qrcode-login";
pub const SEND_CODE: &str = "/api/user/send-code";
pub const LOGIN_QRCODE: &str = "/api/user/qrcode";
pub const REGISTER: &str = "/api/user/register";

/// User and login endpoints
///
/// With a session writer attached, a successful login stores the returned
/// token, client id and trace id so later calls go out authenticated.
#[derive(Clone)]
pub struct UserApi {
    client: SignedClient,
    session: Option<Arc<dyn SessionWriter>>,
}

impl UserApi {
    pub fn new(client: SignedClient) -> Self {
        Self {
            client,
            session: None,
        }
    }

    pub fn with_session_writer(mut self, session: Arc<dyn SessionWriter>) -> Self {
        self.session = Some(session);
        self
    }

    /// Log in with a phone number and SMS code
    #[instrument(skip(self, code))]
    pub async fn phone_login(&self, phone: &str, code: &str) -> Result<LoginResponse, PipelineError> {
        let params = to_params(&PhoneLoginParams {
            phone: phone.to_string(),
            code: code.to_string(),
        })?;
        let response: LoginResponse = self.client.send(PHONE_LOGIN, params).await?;
        self.store(&response);
        Ok(response)
    }

    /// Log in by confirming a scanned QR code
    #[instrument(skip(self))]
    pub async fn qrcode_login(&self, qr_code: &str) -> Result<LoginResponse, PipelineError> {
        let params = to_params(&QrCodeLoginParams {
            qr_code: qr_code.to_string(),
        })?;
        let response: LoginResponse = self.client.send(QRCODE_LOGIN, params).await?;
        self.store(&response);
        Ok(response)
    }

    /// Ask the server to text a login code to `phone`
    pub async fn send_phone_code(&self, phone: &str) -> Result<Value, PipelineError> {
        self.client
            .send_value(SEND_CODE, json!({ "phone": phone }))
            .await
    }

    /// Fetch a fresh login QR code
    pub async fn login_qrcode(&self) -> Result<Value, PipelineError> {
        self.client.send_value(LOGIN_QRCODE, json!({})).await
    }

    pub async fn register(&self, params: &RegisterParams) -> Result<UserInfo, PipelineError> {
        self.client.send(REGISTER, to_params(params)?).await
    }

    fn store(&self, response: &LoginResponse) {
        if let Some(session) = &self.session {
            session.set_token(response.token.clone());
            session.set_client_info(response.client_id.clone(), response.trace_id.clone());
            info!(user_id = response.user_id, "session established");
        }
    }
}
