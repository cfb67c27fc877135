use url::form_urlencoded;

/// Audio encoding assumed when the client does not send one
pub const DEFAULT_ENCODING: &str = "linear16";

/// Sample rate assumed when the client does not send one
pub const DEFAULT_SAMPLE_RATE: &str = "16000";

/// Per-session parameters forwarded to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Fixed server-side; never read from the client
    pub model: String,

    pub encoding: String,

    /// Kept as text; the provider validates it
    pub sample_rate: String,

    pub eot_threshold: Option<String>,

    pub eager_eot_threshold: Option<String>,

    pub eot_timeout_ms: Option<String>,

    /// Repeated `keyterm` values, in the order the client sent them
    pub keyterms: Vec<String>,
}

impl ConnectionParams {
    /// Parse the raw query string of the client's upgrade request.
    ///
    /// Blank values count as absent, and the first occurrence wins for
    /// single-valued keys. Every non-blank `keyterm` is kept.
    pub fn from_query(query: Option<&str>, model: &str) -> Self {
        let mut params = Self {
            model: model.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE.to_string(),
            eot_threshold: None,
            eager_eot_threshold: None,
            eot_timeout_ms: None,
            keyterms: Vec::new(),
        };

        let mut seen_encoding = false;
        let mut seen_sample_rate = false;

        let pairs = form_urlencoded::parse(query.unwrap_or_default().as_bytes());
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }

            match &*key {
                "encoding" if !seen_encoding => {
                    params.encoding = value.into_owned();
                    seen_encoding = true;
                }
                "sample_rate" if !seen_sample_rate => {
                    params.sample_rate = value.into_owned();
                    seen_sample_rate = true;
                }
                "eot_threshold" if params.eot_threshold.is_none() => {
                    params.eot_threshold = Some(value.into_owned());
                }
                "eager_eot_threshold" if params.eager_eot_threshold.is_none() => {
                    params.eager_eot_threshold = Some(value.into_owned());
                }
                "eot_timeout_ms" if params.eot_timeout_ms.is_none() => {
                    params.eot_timeout_ms = Some(value.into_owned());
                }
                "keyterm" => params.keyterms.push(value.into_owned()),
                _ => {}
            }
        }

        params
    }

    /// Build the provider URL for these parameters.
    ///
    /// The fixed and optional parameters are form-encoded; key-terms are
    /// appended afterwards as literal `&keyterm=<value>` pairs without any
    /// escaping.
    pub fn upstream_url(&self, base: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("model", &self.model)
            .append_pair("encoding", &self.encoding)
            .append_pair("sample_rate", &self.sample_rate);

        let optional = [
            ("eot_threshold", &self.eot_threshold),
            ("eager_eot_threshold", &self.eager_eot_threshold),
            ("eot_timeout_ms", &self.eot_timeout_ms),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                query.append_pair(key, value);
            }
        }

        let mut url = format!("{}?{}", base, query.finish());
        for term in &self.keyterms {
            url.push_str("&keyterm=");
            url.push_str(term);
        }

        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let params = ConnectionParams::from_query(Some("encoding=&sample_rate="), "m");
        assert_eq!(params.encoding, DEFAULT_ENCODING);
        assert_eq!(params.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_first_value_wins() {
        let params = ConnectionParams::from_query(Some("encoding=mulaw&encoding=opus"), "m");
        assert_eq!(params.encoding, "mulaw");
    }

    #[test]
    fn test_model_is_not_client_controlled() {
        let params = ConnectionParams::from_query(Some("model=nova-3"), "flux-general-en");
        assert_eq!(params.model, "flux-general-en");
    }
}
