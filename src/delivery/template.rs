use crate::persona::Persona;
use tera::{Context, Tera};

const FEEDBACK_TEMPLATE: &str = include_str!("../../templates/feedback.html");

/// Subject, plain text, and branded HTML for one outbound reply.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Render the feedback reply with the persona's branding. A template
/// failure degrades to the plain-text body rather than blocking delivery.
pub fn render_feedback(persona: &Persona, original_subject: &str, feedback: &str) -> RenderedEmail {
    let subject = reply_subject(original_subject);
    let html = render_html(persona, feedback);
    RenderedEmail {
        subject,
        text: format!(
            "{feedback}\n\n--\nAnalyzed by {}. Reply with another campaign to get more feedback.",
            persona.name
        ),
        html,
    }
}

/// Render the polite failure notice. Only the typed error's user-safe
/// message goes in; detail bags stay in the logs.
pub fn render_error_notice(persona: &Persona, user_message: &str) -> RenderedEmail {
    let body = format!(
        "{user_message}\n\nIf the problem keeps happening, reply to this email and we'll look into it."
    );
    let html = render_html(persona, &body);
    RenderedEmail {
        subject: "We couldn't analyze your email".into(),
        text: body,
        html,
    }
}

fn reply_subject(original_subject: &str) -> String {
    let trimmed = original_subject.trim();
    if trimmed.is_empty() {
        "Your campaign feedback".into()
    } else if trimmed.to_lowercase().starts_with("re:") {
        trimmed.to_string()
    } else {
        format!("Re: {trimmed}")
    }
}

fn render_html(persona: &Persona, body: &str) -> Option<String> {
    let mut context = Context::new();
    context.insert("primary_color", &persona.email_config.primary_color);
    context.insert("header_text", &persona.email_config.header_text);
    context.insert("persona_name", &persona.name);
    context.insert("body", body);

    match Tera::one_off(FEEDBACK_TEMPLATE, &context, true) {
        Ok(html) => Some(html),
        Err(e) => {
            tracing::warn!("feedback template render failed, sending text only: {e}");
            None
        }
    }
}
