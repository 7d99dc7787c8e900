//! Email rendering and action-link construction.
//!
//! The daily email embeds three capability links per recipient: like,
//! dislike, and unsubscribe. Tokens and the saying travel as query
//! parameters, so everything is percent-encoded here and decoded by the
//! handlers on the way back in.

use url::form_urlencoded;

use crate::content::Etymology;

/// Subject line for the daily email.
pub fn daily_subject(saying: &str) -> String {
    format!("\u{1F4DA} Today's Etymology: \"{}\"", saying)
}

/// Feedback action link carrying the token, the saying, and the vote.
pub fn feedback_url(api_base: &str, token: &str, saying: &str, feedback: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("token", token)
        .append_pair("saying", saying)
        .append_pair("feedback", feedback)
        .finish();
    format!("{}/feedback?{}", api_base, query)
}

/// Unsubscribe action link.
pub fn unsubscribe_url(api_base: &str, token: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("token", token)
        .finish();
    format!("{}/unsubscribe?{}", api_base, query)
}

/// Confirmation link pointing at the site's confirm page.
pub fn confirmation_url(site_url: &str, token: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("token", token)
        .finish();
    format!("{}/confirm?{}", site_url, query)
}

/// The daily etymology email.
pub fn daily_email_html(
    etymology: &Etymology,
    like_url: &str,
    dislike_url: &str,
    unsubscribe: &str,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
      body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', sans-serif; line-height: 1.6; color: #333; background-color: #f9fafb; margin: 0; padding: 0; }}
      .container {{ max-width: 600px; margin: 40px auto; background: linear-gradient(135deg, #fef3c7 0%, #fde68a 100%); border-radius: 12px; overflow: hidden; }}
      .header {{ background: linear-gradient(135deg, #d97706 0%, #b45309 100%); color: white; padding: 32px 24px; text-align: center; }}
      .content {{ padding: 32px 24px; background: white; }}
      .saying {{ font-size: 24px; font-weight: 700; color: #d97706; margin-bottom: 16px; text-align: center; }}
      .era-badge {{ display: inline-block; background: #fef3c7; color: #d97706; padding: 4px 12px; border-radius: 16px; font-size: 12px; font-weight: 600; }}
      .section {{ margin-bottom: 24px; }}
      .section-title {{ font-size: 14px; font-weight: 700; color: #78716c; text-transform: uppercase; letter-spacing: 0.5px; margin-bottom: 8px; }}
      .section-content {{ color: #44403c; line-height: 1.8; }}
      .feedback-section {{ text-align: center; padding: 24px; background: #fafaf9; border-top: 1px solid #e7e5e4; }}
      .feedback-button {{ display: inline-block; padding: 12px 24px; border-radius: 8px; text-decoration: none; font-weight: 600; font-size: 14px; color: white; }}
      .like {{ background: #22c55e; }}
      .dislike {{ background: #ef4444; }}
      .footer {{ text-align: center; padding: 24px; font-size: 12px; color: #78716c; background: #fafaf9; }}
      .unsubscribe {{ color: #d97706; text-decoration: none; }}
    </style>
  </head>
  <body>
    <div class="container">
      <div class="header"><h1>&#128218; Etymology Daily</h1></div>
      <div class="content">
        <div style="text-align: center;"><span class="era-badge">{era}</span></div>
        <div class="saying">"{saying}"</div>
        <div class="section">
          <div class="section-title">The Origin</div>
          <div class="section-content">{origin}</div>
        </div>
        <div class="section">
          <div class="section-title">Modern Meaning</div>
          <div class="section-content">{meaning}</div>
        </div>
      </div>
      <div class="feedback-section">
        <div>Did you enjoy today's etymology?</div>
        <p>
          <a href="{like_url}" class="feedback-button like">&#128077; I liked it</a>
          <a href="{dislike_url}" class="feedback-button dislike">&#128078; Not my favorite</a>
        </p>
      </div>
      <div class="footer">
        <p>Etymology Daily - Bringing the stories of language to life</p>
        <p>You're receiving this because you subscribed to our daily etymology emails.</p>
        <p><a href="{unsubscribe}" class="unsubscribe">Unsubscribe from daily etymologies</a></p>
      </div>
    </div>
  </body>
</html>"#,
        era = etymology.era,
        saying = etymology.saying,
        origin = etymology.origin,
        meaning = etymology.meaning,
        like_url = like_url,
        dislike_url = dislike_url,
        unsubscribe = unsubscribe,
    )
}

/// The double-opt-in confirmation email.
pub fn confirmation_email_html(confirmation_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <style>
      body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
      .header {{ background: linear-gradient(135deg, #9b87f5 0%, #D6BCFA 100%); padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }}
      .header h1 {{ color: white; margin: 0; font-size: 28px; }}
      .content {{ background: #f8f9fa; padding: 30px; border-radius: 0 0 10px 10px; }}
      .button {{ display: inline-block; padding: 15px 30px; background: linear-gradient(135deg, #9b87f5 0%, #D6BCFA 100%); color: white; text-decoration: none; border-radius: 5px; font-weight: bold; margin: 20px 0; }}
      .footer {{ text-align: center; margin-top: 20px; color: #666; font-size: 12px; }}
    </style>
  </head>
  <body>
    <div class="header"><h1>&#128218; Etymology Daily</h1></div>
    <div class="content">
      <h2>Welcome to Etymology Daily!</h2>
      <p>Thank you for subscribing to our daily etymology newsletter. You're one step away from starting your journey through the fascinating history of words.</p>
      <p>Please confirm your email address by clicking the button below:</p>
      <div style="text-align: center;"><a href="{url}" class="button">Confirm Subscription</a></div>
      <p>Or copy and paste this link into your browser:</p>
      <p style="word-break: break-all; color: #666; font-size: 14px;">{url}</p>
      <p>Once confirmed, you'll receive your first etymology email tomorrow morning!</p>
      <p>If you didn't subscribe to Etymology Daily, you can safely ignore this email.</p>
    </div>
    <div class="footer"><p>Etymology Daily - Discover the stories behind words</p></div>
  </body>
</html>"#,
        url = confirmation_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn etymology() -> Etymology {
        Etymology {
            saying: "break the ice".to_string(),
            origin: "Ships once broke ice to open trade routes.".to_string(),
            meaning: "To ease initial social tension.".to_string(),
            era: "16th Century".to_string(),
        }
    }

    #[test]
    fn test_feedback_url_encodes_saying() {
        let url = feedback_url("https://api.example.com", "id.1.sig", "break the ice", "like");
        assert!(url.starts_with("https://api.example.com/feedback?"));
        assert!(url.contains("token=id.1.sig"));
        assert!(url.contains("saying=break+the+ice"));
        assert!(url.contains("feedback=like"));
        assert!(!url.contains("break the ice"));
    }

    #[test]
    fn test_unsubscribe_url() {
        let url = unsubscribe_url("https://api.example.com", "id.1.sig");
        assert_eq!(url, "https://api.example.com/unsubscribe?token=id.1.sig");
    }

    #[test]
    fn test_daily_email_embeds_content_and_links() {
        let html = daily_email_html(
            &etymology(),
            "https://api.example.com/feedback?feedback=like",
            "https://api.example.com/feedback?feedback=dislike",
            "https://api.example.com/unsubscribe?token=t",
        );

        assert!(html.contains("\"break the ice\""));
        assert!(html.contains("Ships once broke ice"));
        assert!(html.contains("To ease initial social tension."));
        assert!(html.contains("16th Century"));
        assert!(html.contains("https://api.example.com/feedback?feedback=like"));
        assert!(html.contains("https://api.example.com/feedback?feedback=dislike"));
        assert!(html.contains("https://api.example.com/unsubscribe?token=t"));
    }

    #[test]
    fn test_confirmation_email_embeds_link() {
        let html = confirmation_email_html("https://example.com/confirm?token=abc");
        // Link appears both as the button href and as the copy-paste fallback
        assert_eq!(html.matches("https://example.com/confirm?token=abc").count(), 2);
    }
}
