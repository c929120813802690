/// Webmail/deeplink format used for one-click reply URLs.
/// Unknown config values fall back to plain mailto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkMode {
    #[default]
    Mailto,
    Gmail,
    OutlookOffice,
    OutlookLive,
}

impl LinkMode {
    /// Parse a configured mode string, case-insensitively, accepting the
    /// aliases webmail users know these modes by. Anything unrecognized
    /// is mailto.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gmail" => Self::Gmail,
            "outlook_office" | "outlook365" | "owa" => Self::OutlookOffice,
            "outlook_live" | "outlook" | "outlook_com" => Self::OutlookLive,
            _ => Self::Mailto,
        }
    }
}

/// Build the provider-specific compose link for one reply option.
/// Webmail modes use plus-encoding for query values; mailto uses plain
/// percent-encoding so mail clients do not show literal '+' signs.
pub fn build_reply_link(mode: LinkMode, to_addr: &str, subject: &str, body: &str) -> String {
    match mode {
        LinkMode::Gmail => format!(
            "https://mail.google.com/mail/?view=cm&fs=1&to={}&su={}&body={}",
            urlencode_plus(to_addr),
            urlencode_plus(subject),
            urlencode_plus(body),
        ),
        // popoutv2=0 forces inline compose instead of a popup window.
        LinkMode::OutlookOffice => format!(
            "https://outlook.office.com/mail/0/deeplink/compose?popoutv2=0&to={}&subject={}&body={}",
            urlencode_plus(to_addr),
            urlencode_plus(subject),
            urlencode_plus(body),
        ),
        LinkMode::OutlookLive => format!(
            "https://outlook.live.com/owa/?path=/mail/action/compose&to={}&subject={}&body={}",
            urlencode_plus(to_addr),
            urlencode_plus(subject),
            urlencode_plus(body),
        ),
        LinkMode::Mailto => format!(
            "mailto:{}?subject={}&body={}",
            urlencode(to_addr),
            urlencode(subject),
            urlencode(body),
        ),
    }
}

/// Percent-encode everything outside the unreserved set.
pub(crate) fn urlencode(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '~' => result.push(c),
            _ => {
                for b in c.to_string().as_bytes() {
                    result.push_str(&format!("%{:02X}", b));
                }
            }
        }
    }
    result
}

/// Form-style encoding: like [`urlencode`] but spaces become '+'.
fn urlencode_plus(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            ' ' => result.push('+'),
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '~' => result.push(c),
            _ => {
                for b in c.to_string().as_bytes() {
                    result.push_str(&format!("%{:02X}", b));
                }
            }
        }
    }
    result
}
