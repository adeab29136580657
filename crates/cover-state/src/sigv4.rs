//! AWS Signature Version 4 for S3-compatible endpoints
//!
//! Header-based signing through `aws-sigv4`, configured the way S3 expects:
//! single percent-encoding, no path normalisation and an
//! `x-amz-content-sha256` header carrying the payload hash.

use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, PercentEncodingMode, SignableBody, SignableRequest,
    SigningParams, SigningSettings, UriPathNormalizationMode,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;

use crate::error::StorageError;
use crate::storage_traits::StorageResult;

const SERVICE: &str = "s3";

/// Signs requests for one set of credentials and one region.
#[derive(Debug, Clone)]
pub(crate) struct Signer {
    identity: Identity,
    region: String,
}

impl Signer {
    pub(crate) fn new(access_key_id: &str, secret_access_key: &str, region: &str) -> Self {
        let identity = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "cover-state",
        )
        .into();

        Self {
            identity,
            region: region.to_string(),
        }
    }

    /// Headers to add to the request: `authorization`, `x-amz-date` and
    /// `x-amz-content-sha256`.
    ///
    /// `headers` are the ones sent with the request that take part in the
    /// signature; `host` is taken from `url`.
    pub(crate) fn sign<'a>(
        &self,
        method: &'a str,
        url: &'a str,
        headers: impl Iterator<Item = (&'a str, &'a str)>,
        body: &'a [u8],
        at: SystemTime,
    ) -> StorageResult<Vec<(String, String)>> {
        let mut settings = SigningSettings::default();
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        settings.percent_encoding_mode = PercentEncodingMode::Single;
        settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;

        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&self.identity)
            .region(&self.region)
            .name(SERVICE)
            .time(at)
            .settings(settings)
            .build()
            .map_err(signing_error)?
            .into();

        let request = SignableRequest::new(method, url, headers, SignableBody::Bytes(body))
            .map_err(signing_error)?;
        let (instructions, _signature) = sign(request, &params)
            .map_err(signing_error)?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

fn signing_error(err: impl std::fmt::Display) -> StorageError {
    StorageError::Signing(err.to_string())
}
