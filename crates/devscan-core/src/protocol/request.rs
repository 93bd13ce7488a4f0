//! Outgoing request builders.

use serde_json::{json, Map, Value};

use super::JSONRPC_VERSION;
use crate::configure::query::{ConfigurationQuery, Ipv4Config, NetSettingsRequest};

fn net_settings_json(settings: &NetSettingsRequest) -> Value {
    let mut interface = Map::new();
    interface.insert("name".to_string(), json!(settings.interface_name));

    match &settings.ipv4 {
        Ipv4Config::Dhcp => {
            interface.insert("configurationMethod".to_string(), json!("dhcp"));
        }
        Ipv4Config::Manual { address, netmask } => {
            interface.insert("configurationMethod".to_string(), json!("manual"));
            interface.insert(
                "ipv4".to_string(),
                json!({
                    "manualAddress": address.to_string(),
                    "manualNetmask": netmask.to_string(),
                }),
            );
        }
    }

    let mut net_settings = Map::new();
    net_settings.insert("interface".to_string(), Value::Object(interface));
    if let Some(gateway) = settings.default_gateway {
        net_settings.insert(
            "defaultGateway".to_string(),
            json!({ "ipv4Address": gateway.to_string() }),
        );
    }

    Value::Object(net_settings)
}

/// Serialize a `configure` request carrying correlation id `id`.
pub fn encode_configure_request(id: &str, query: &ConfigurationQuery, ttl: u32) -> String {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": "configure",
        "id": id,
        "params": {
            "device": { "uuid": query.target_device_uuid },
            "netSettings": net_settings_json(&query.net_settings),
            "ttl": ttl,
        }
    })
    .to_string()
}
