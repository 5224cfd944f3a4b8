// Shared Access Signatures
//
// Service SAS (container or blob scope) for URLs handed to the translation
// service and end users; account SAS for this process's own REST calls.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use doctrans_core::error::{AppError, Result};
use doctrans_core::port::AccessScope;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;
use url::form_urlencoded;

pub const SAS_VERSION: &str = "2022-11-02";

const SIGNED_PROTOCOL: &str = "https,http";

/// Account SAS permissions for the worker's own calls
const ACCOUNT_PERMISSIONS: &str = "rwdlacup";

/// Characters left as-is inside one blob path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub struct SasSigner {
    account: String,
    key: Vec<u8>,
}

impl SasSigner {
    pub fn new(account: impl Into<String>, key: Vec<u8>) -> Self {
        Self {
            account: account.into(),
            key,
        }
    }

    /// Query string granting `scope` on a whole container (`sr=c`)
    pub fn container_sas(
        &self,
        container: &str,
        scope: AccessScope,
        expiry: DateTime<Utc>,
    ) -> Result<String> {
        let resource = format!("/blob/{}/{}", self.account, container);
        self.service_sas(&resource, "c", &scope.permissions(), expiry)
    }

    /// Query string granting `scope` on one blob (`sr=b`)
    pub fn blob_sas(
        &self,
        container: &str,
        path: &str,
        scope: AccessScope,
        expiry: DateTime<Utc>,
    ) -> Result<String> {
        let resource = format!("/blob/{}/{}/{}", self.account, container, path);
        self.service_sas(&resource, "b", &scope.permissions(), expiry)
    }

    /// Query string for blob + queue service calls made by this process
    pub fn account_sas(&self, expiry: DateTime<Utc>) -> Result<String> {
        let se = format_time(expiry);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
            self.account, ACCOUNT_PERMISSIONS, "bq", "sco", "", se, "", SIGNED_PROTOCOL, SAS_VERSION, ""
        );
        let sig = self.sign(&string_to_sign)?;

        Ok(form_urlencoded::Serializer::new(String::new())
            .append_pair("sv", SAS_VERSION)
            .append_pair("ss", "bq")
            .append_pair("srt", "sco")
            .append_pair("sp", ACCOUNT_PERMISSIONS)
            .append_pair("se", &se)
            .append_pair("spr", SIGNED_PROTOCOL)
            .append_pair("sig", &sig)
            .finish())
    }

    fn service_sas(
        &self,
        canonical_resource: &str,
        signed_resource: &str,
        permissions: &str,
        expiry: DateTime<Utc>,
    ) -> Result<String> {
        if permissions.is_empty() {
            return Err(AppError::Validation("SAS needs at least one permission".to_string()));
        }
        let se = format_time(expiry);
        // sp, st, se, resource, si, sip, spr, sv, sr, snapshot, ses, rscc, rscd, rsce, rscl, rsct
        let fields = [
            permissions,
            "",
            se.as_str(),
            canonical_resource,
            "",
            "",
            SIGNED_PROTOCOL,
            SAS_VERSION,
            signed_resource,
            "",
            "",
            "",
            "",
            "",
            "",
            "",
        ];
        let sig = self.sign(&fields.join("\n"))?;

        Ok(form_urlencoded::Serializer::new(String::new())
            .append_pair("sv", SAS_VERSION)
            .append_pair("sr", signed_resource)
            .append_pair("sp", permissions)
            .append_pair("se", &se)
            .append_pair("spr", SIGNED_PROTOCOL)
            .append_pair("sig", &sig)
            .finish())
    }

    fn sign(&self, string_to_sign: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|e| AppError::Config(format!("Invalid account key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Percent-encode a blob path segment by segment
pub fn encode_blob_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}
