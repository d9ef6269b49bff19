use crate::types::{AlertRecord, Notification};

const SEPARATOR: &str = "\n";

/// Renders included alerts into the text posted to every endpoint.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    link_base: String,
    masked_domains: Vec<String>,
}

impl MessageFormatter {
    pub fn new<I, S>(link_base: impl Into<String>, masked_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            link_base: link_base.into(),
            masked_domains: masked_domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn link(&self, page_key: &str) -> String {
        format!("{}{}", self.link_base, page_key)
    }

    /// Defang listed domains so chat clients do not unfurl a preview of
    /// them (`cwa.gov.tw` becomes `cwa[.]gov[.]tw`).
    pub fn mask_domains(&self, body: &str) -> String {
        self.masked_domains
            .iter()
            .fold(body.to_string(), |text, domain| {
                text.replace(domain.as_str(), &domain.replace('.', "[.]"))
            })
    }

    pub fn render(&self, page_key: &str, record: &AlertRecord) -> Notification {
        let link = self.link(page_key);
        let text = format!("{}{}{}", self.mask_domains(record.body.trim()), SEPARATOR, link);

        Notification {
            page_key: page_key.to_string(),
            link,
            text,
        }
    }
}
