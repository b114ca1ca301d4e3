//! Request and response bodies of the HTTP API.
//!
//! Field names follow the browser UI's camelCase conventions.

use std::collections::BTreeMap;

use bigbox_core::{MakeRequest, Profile};
use serde::{Deserialize, Serialize};

/// Body of `POST /make`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakeBody {
    pub selected_port: String,
    #[serde(rename = "profileId")]
    pub profile_id: String,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

impl From<MakeBody> for MakeRequest {
    fn from(body: MakeBody) -> Self {
        Self {
            port: body.selected_port,
            profile_id: body.profile_id,
            is_default: body.is_default,
        }
    }
}

/// Response of `GET /firmwareprofiles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileList {
    pub profiles: BTreeMap<String, Profile>,
}

/// Response of `POST /check_dep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStatus {
    #[serde(rename = "isInstalled")]
    pub is_installed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_body_from_ui() {
        let body: MakeBody = serde_json::from_str(
            r#"{"selected_port": "/dev/ttyACM0", "profileId": "bigbox-dual", "isDefault": true}"#,
        )
        .unwrap();
        let request = MakeRequest::from(body);

        assert_eq!(request.port, "/dev/ttyACM0");
        assert_eq!(request.profile_id, "bigbox-dual");
        assert!(request.is_default);
    }

    #[test]
    fn test_dependency_status_json() {
        let json = serde_json::to_string(&DependencyStatus { is_installed: true }).unwrap();
        assert_eq!(json, r#"{"isInstalled":true}"#);
    }
}
