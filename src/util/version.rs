pub const APP_NAME: &str = "Flight Checkout";
pub const APP_AUTHOR: &str = "SetScallywag";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_TAG: Option<&str> = option_env!("GIT_TAG");

pub fn version_label() -> String {
    if let Some(tag) = GIT_TAG {
        tag.to_string()
    } else {
        format!("v{}", APP_VERSION)
    }
}

/// Sent with every storefront request.
pub fn user_agent() -> String {
    format!("{}/{} ({})", APP_NAME.replace(' ', "-"), version_label(), APP_AUTHOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_app_and_version() {
        let agent = user_agent();
        assert!(agent.starts_with("Flight-Checkout/"));
        assert!(agent.contains(&version_label()));
    }
}
