//! Turns observed API traffic into notifications for the content context.

use serde::{Deserialize, Serialize};

use crate::config::OperationsConfig;
use crate::error::Result;

/// Message posted from the background context to a tab.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RelaySignal {
    /// Something on the page changed; run a reconcile pass.
    ReconcileNeeded,
    /// Library contents may have changed wholesale; drop the cache first.
    RefreshNeeded,
}

#[derive(Deserialize)]
struct ObservedBody {
    #[serde(rename = "operationName", default)]
    operation_name: Option<String>,
}

/// Decides which signal, if any, an outgoing API request should raise.
///
/// Our own lookup traffic never raises one, which keeps a lookup from
/// scheduling the next lookup.
pub fn classify_request(
    url: &str,
    body: Option<&[u8]>,
    operations: &OperationsConfig,
) -> Result<Option<RelaySignal>> {
    let name = match body {
        Some(bytes) if !bytes.is_empty() => {
            serde_json::from_slice::<ObservedBody>(bytes)?.operation_name
        }
        _ => operation_from_url(url),
    };

    let Some(name) = name else {
        return Ok(None);
    };
    if name == operations.lookup.name {
        return Ok(None);
    }
    if operations.refresh_triggers.iter().any(|op| *op == name) {
        return Ok(Some(RelaySignal::RefreshNeeded));
    }
    Ok(Some(RelaySignal::ReconcileNeeded))
}

fn operation_from_url(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "operationName")
        .map(|(_, value)| value.into_owned())
}
