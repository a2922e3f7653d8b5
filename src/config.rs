use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct Config {
    pub telegram: Telegram,
    pub server_addr: SocketAddr,
    pub services: Services,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Telegram {
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Services {
    pub directus: Directus,
    pub assistant: Assistant,
}

/// Record store holding the housing and relocation data.
#[derive(Serialize, Deserialize, Debug)]
pub struct Directus {
    pub url: String,
    pub token: String,
}

/// Question-answering backend used for free-text assistant mode.
#[derive(Serialize, Deserialize, Debug)]
pub struct Assistant {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_example_config() -> anyhow::Result<()> {
        let config_text = std::fs::read_to_string("config.example.yaml")?;
        let config: Config = serde_yaml::from_str(&config_text)?;

        similar_asserts::assert_serde_eq!(
            serde_yaml::to_value(&config)?,
            serde_yaml::from_str::<serde_yaml::Value>(&config_text)?,
            "Extra fields in config.example.yaml?",
        );

        Ok(())
    }
}
