use super::OutboundEmail;

/// Minimal escaping for values interpolated into the HTML body.
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn verification_email(to: &str, name: &str, link: &str) -> OutboundEmail {
    let (name_html, link_html) = (escape_html(name), escape_html(link));
    OutboundEmail {
        to: to.to_string(),
        subject: "Verify your email".into(),
        html: format!(
            "<p>Hi {name_html},</p><p>Please verify your email by clicking the link below:</p>\
             <p><a href=\"{link_html}\">{link_html}</a></p>"
        ),
        text: format!("Hi {name}, verify your email: {link}"),
    }
}

pub fn password_reset_email(to: &str, link: &str) -> OutboundEmail {
    let link_html = escape_html(link);
    OutboundEmail {
        to: to.to_string(),
        subject: "Reset your password".into(),
        html: format!(
            "<p>Use the link below to reset your password:</p>\
             <p><a href=\"{link_html}\">{link_html}</a></p>"
        ),
        text: format!("Reset your password: {link}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_email_carries_link_in_both_bodies() {
        let mail = verification_email("ada@example.com", "Ada", "https://x.test/verify-email?token=t");
        assert_eq!(mail.subject, "Verify your email");
        assert!(mail.text.contains("https://x.test/verify-email?token=t"));
        assert!(mail.html.contains("href=\"https://x.test/verify-email?token=t\""));
    }

    #[test]
    fn names_are_escaped_in_html() {
        let mail = verification_email("a@example.com", "<b>Eve</b>", "https://x.test/");
        assert!(mail.html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(!mail.html.contains("<b>Eve"));
    }

    #[test]
    fn reset_email_subject() {
        let mail = password_reset_email("a@example.com", "https://x.test/reset-password?token=t");
        assert_eq!(mail.subject, "Reset your password");
        assert!(mail.text.ends_with("token=t"));
    }
}
