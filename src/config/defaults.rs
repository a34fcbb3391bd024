use super::*;

impl Default for TessieConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tessie.com".to_string(),
            access_token: String::new(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            refresh_timeout_secs: 10,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8099,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/tessie-bridge.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tessie: TessieConfig::default(),
            poll: PollConfig::default(),
            web: WebConfig::default(),
            logging: LoggingConfig::default(),
            entries_file: "/data/tessie_bridge_entries.json".to_string(),
        }
    }
}
