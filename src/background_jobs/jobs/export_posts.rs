//! Post export task.
//!
//! Collects every post of the requesting user into a JSON archive and
//! mails it to them as an attachment.

use crate::background_jobs::{
    context::TaskContext,
    task::{BackgroundTask, TaskArgs, TaskError},
};
use crate::mail::{send_email, DeliveryMode, EmailMessage};
use crate::store::{Post, StoreError};
use chrono::SecondsFormat;
use serde::Serialize;
use tracing::info;

pub const EXPORT_POSTS_TASK: &str = "export_posts";
pub const EXPORT_SUBJECT: &str = "[Microblog] Your blog posts";
pub const EXPORT_ATTACHMENT: &str = "posts.json";

#[derive(Debug, Serialize)]
struct ExportedPost {
    body: String,
    timestamp: String,
}

impl From<&Post> for ExportedPost {
    fn from(post: &Post) -> Self {
        Self {
            body: post.body.clone(),
            timestamp: post.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Serialize)]
struct PostArchive {
    posts: Vec<ExportedPost>,
}

pub struct ExportPostsTask;

impl BackgroundTask for ExportPostsTask {
    fn name(&self) -> &'static str {
        EXPORT_POSTS_TASK
    }

    fn description(&self) -> &'static str {
        "Exporting posts..."
    }

    fn execute(&self, ctx: &TaskContext, _args: &TaskArgs) -> Result<(), TaskError> {
        let user = ctx
            .db()
            .get_user(ctx.user_id)?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", ctx.user_id)))?;

        ctx.set_progress(0)?;

        let posts = ctx.db().user_posts_ascending(user.id)?;
        let total = posts.len();
        let delay = ctx.services.export_step_delay;
        let mut exported = Vec::with_capacity(total);
        for (i, post) in posts.iter().enumerate() {
            exported.push(ExportedPost::from(post));
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            ctx.set_progress((100 * (i + 1) / total) as u8)?;
        }

        let archive = serde_json::to_vec_pretty(&PostArchive { posts: exported })?;
        let message = EmailMessage::new(
            EXPORT_SUBJECT,
            &ctx.services.mail_sender,
            vec![user.email.clone()],
            format!(
                "Dear {},\n\nPlease find attached the archive of your posts that you requested.\n\nSincerely,\n\nThe Microblog Team\n",
                user.username
            ),
        )
        .with_html(format!(
            "<p>Dear {},</p>\n<p>Please find attached the archive of your posts that you requested.</p>\n<p>Sincerely,</p>\n<p>The Microblog Team</p>\n",
            user.username
        ))
        .attach(EXPORT_ATTACHMENT, "application/json", archive);
        send_email(ctx.mailer(), message, DeliveryMode::Sync)?;

        info!("Exported {} posts of user {}", total, user.username);
        ctx.set_progress(100)
    }
}
