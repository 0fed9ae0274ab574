//! Command handlers for the `gator` CLI.
//!
//! Every handler receives the [`AppContext`] explicitly and writes its
//! human-readable output to the supplied writer.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::io::Write;
use std::path::PathBuf;

use crate::config::Config;
use crate::feed::{Fetcher, Scheduler};
use crate::storage::{Database, Feed, FeedStore, NewFeed, Post, StoreError, User};
use crate::util::{strip_control_chars, validate_url};

/// Default number of posts shown by `browse`
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

/// Process-wide state, passed to every handler.
pub struct AppContext {
    pub db: Database,
    pub config: Config,
    pub config_path: PathBuf,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch the current user
    Login { name: String },
    /// Delete all users, feeds, follows and posts
    Reset,
    /// List users
    Users,
    /// Poll feeds forever, one per interval (e.g. 30s, 1m, 1h30m)
    Agg { interval: String },
    /// Add a feed and follow it
    Addfeed { name: String, url: String },
    /// List all feeds
    Feeds,
    /// Follow an existing feed by URL
    Follow { url: String },
    /// List the feeds the current user follows
    Following,
    /// Stop following a feed
    Unfollow { url: String },
    /// Show the newest posts from followed feeds
    Browse {
        #[arg(default_value_t = DEFAULT_BROWSE_LIMIT, value_parser = clap::value_parser!(i64).range(1..))]
        limit: i64,
    },
}

impl AppContext {
    pub fn new(db: Database, config: Config, config_path: PathBuf) -> Self {
        Self {
            db,
            config,
            config_path,
        }
    }

    /// Dispatch one command.
    pub async fn run<W: Write>(&mut self, command: Command, out: &mut W) -> Result<()> {
        match command {
            Command::Register { name } => self.register(&name, out).await,
            Command::Login { name } => self.login(&name, out).await,
            Command::Reset => self.reset(out).await,
            Command::Users => self.users(out).await,
            Command::Agg { interval } => self.agg(&interval, out).await,
            Command::Addfeed { name, url } => self.add_feed(&name, &url, out).await,
            Command::Feeds => self.feeds(out).await,
            Command::Follow { url } => self.follow(&url, out).await,
            Command::Following => self.following(out).await,
            Command::Unfollow { url } => self.unfollow(&url, out).await,
            Command::Browse { limit } => self.browse(limit, out).await,
        }
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn register<W: Write>(&mut self, name: &str, out: &mut W) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            bail!("User name must not be empty");
        }

        let user = match self.db.create_user(name).await {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => bail!("User {:?} already exists", name),
            Err(e) => return Err(e).context("Failed to create user"),
        };
        self.set_current_user(&user.name)?;

        tracing::info!(user_id = %user.id, name = %user.name, "Registered user");
        writeln!(out, "User {} created", user.name)?;
        Ok(())
    }

    pub async fn login<W: Write>(&mut self, name: &str, out: &mut W) -> Result<()> {
        let user = self
            .db
            .user_by_name(name.trim())
            .await
            .context("Failed to look up user")?
            .with_context(|| format!("User {:?} does not exist", name.trim()))?;
        self.set_current_user(&user.name)?;

        writeln!(out, "Logged in as {}", user.name)?;
        Ok(())
    }

    pub async fn reset<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let removed = self.db.reset().await.context("Failed to reset database")?;
        tracing::info!(users = removed, "Database reset");
        writeln!(out, "Database reset ({} users removed)", removed)?;
        Ok(())
    }

    pub async fn users<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let current = self.config.current_user_name.as_deref();
        for user in self.db.list_users().await.context("Failed to list users")? {
            if Some(user.name.as_str()) == current {
                writeln!(out, "* {} (current)", strip_control_chars(&user.name))?;
            } else {
                writeln!(out, "* {}", strip_control_chars(&user.name))?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Aggregation
    // ========================================================================

    /// Run the scheduler until Ctrl-C. A bad interval fails before any
    /// feed is touched.
    pub async fn agg<W: Write>(&mut self, interval: &str, out: &mut W) -> Result<()> {
        let fetcher = Fetcher::new(&self.config.user_agent, self.config.fetch_timeout())
            .context("Failed to build HTTP client")?;
        let scheduler = Scheduler::from_interval_str(self.db.clone(), fetcher, interval)
            .context("Invalid poll interval")?;

        writeln!(out, "Collecting feeds every {:?}", scheduler.interval())?;
        out.flush()?;

        tokio::select! {
            _ = scheduler.run() => {}
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted, stopping");
            }
        }
        Ok(())
    }

    // ========================================================================
    // Feeds and follows
    // ========================================================================

    pub async fn add_feed<W: Write>(&mut self, name: &str, url: &str, out: &mut W) -> Result<()> {
        let user = self.current_user().await?;
        // Stored exactly as given
        let url = url.trim();
        validate_url(url).with_context(|| format!("Invalid feed URL {:?}", url))?;

        let feed = match self
            .db
            .create_feed(&NewFeed {
                name: name.trim().to_string(),
                url: url.to_string(),
                user_id: user.id,
            })
            .await
        {
            Ok(feed) => feed,
            Err(StoreError::Conflict(_)) => bail!("A feed with URL {} already exists", url),
            Err(e) => return Err(e).context("Failed to create feed"),
        };

        self.db
            .create_feed_follow(user.id, feed.id)
            .await
            .context("Failed to follow new feed")?;

        tracing::info!(feed_id = %feed.id, url = %feed.url, "Added feed");
        writeln!(out, "Added feed {} ({})", strip_control_chars(&feed.name), feed.url)?;
        Ok(())
    }

    pub async fn feeds<W: Write>(&mut self, out: &mut W) -> Result<()> {
        for feed in self.db.get_feeds().await.context("Failed to list feeds")? {
            let owner = self
                .db
                .user_by_id(feed.user_id)
                .await
                .context("Failed to look up feed owner")?
                .map(|u| u.name)
                .unwrap_or_default();
            writeln!(
                out,
                "* {} ({}) by {}",
                strip_control_chars(&feed.name),
                feed.url,
                strip_control_chars(&owner)
            )?;
        }
        Ok(())
    }

    pub async fn follow<W: Write>(&mut self, url: &str, out: &mut W) -> Result<()> {
        let user = self.current_user().await?;
        let feed = self.feed_for_url(url).await?;

        let follow = match self.db.create_feed_follow(user.id, feed.id).await {
            Ok(follow) => follow,
            Err(StoreError::Conflict(_)) => bail!("Already following {}", feed.url),
            Err(e) => return Err(e).context("Failed to follow feed"),
        };

        writeln!(
            out,
            "{} now follows {}",
            strip_control_chars(&follow.user_name),
            strip_control_chars(&follow.feed_name)
        )?;
        Ok(())
    }

    pub async fn following<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let user = self.current_user().await?;
        let follows = self
            .db
            .feed_follows_for_user(user.id)
            .await
            .context("Failed to list follows")?;
        for follow in follows {
            writeln!(out, "* {}", strip_control_chars(&follow.feed_name))?;
        }
        Ok(())
    }

    pub async fn unfollow<W: Write>(&mut self, url: &str, out: &mut W) -> Result<()> {
        let user = self.current_user().await?;
        let feed = self.feed_for_url(url).await?;

        match self.db.delete_feed_follow(user.id, feed.id).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => bail!("Not following {}", feed.url),
            Err(e) => return Err(e).context("Failed to unfollow feed"),
        }

        writeln!(out, "Unfollowed {}", strip_control_chars(&feed.name))?;
        Ok(())
    }

    pub async fn browse<W: Write>(&mut self, limit: i64, out: &mut W) -> Result<()> {
        let user = self.current_user().await?;
        let posts = self
            .db
            .posts_for_user(user.id, limit)
            .await
            .context("Failed to load posts")?;

        if posts.is_empty() {
            writeln!(out, "No posts yet")?;
        }
        for post in &posts {
            write_post(out, post)?;
        }
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// The logged-in user: the config's current user, which must still exist.
    async fn current_user(&self) -> Result<User> {
        let Some(name) = self.config.current_user_name.as_deref() else {
            bail!("Not logged in: run `gator register <name>` or `gator login <name>` first");
        };
        self.db
            .user_by_name(name)
            .await
            .context("Failed to look up current user")?
            .with_context(|| format!("Current user {:?} no longer exists; log in again", name))
    }

    async fn feed_for_url(&self, url: &str) -> Result<Feed> {
        let url = url.trim();
        self.db
            .get_feed(url)
            .await
            .context("Failed to look up feed")?
            .with_context(|| format!("No feed with URL {}", url))
    }

    fn set_current_user(&mut self, name: &str) -> Result<()> {
        self.config.set_user(name);
        self.config.save(&self.config_path).with_context(|| {
            format!("Failed to save config to {}", self.config_path.display())
        })
    }
}

fn write_post<W: Write>(out: &mut W, post: &Post) -> Result<()> {
    let published = post
        .published_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown date".to_string());
    writeln!(out, "{} ({})", strip_control_chars(&post.title), published)?;
    writeln!(out, "  {}", post.url)?;
    if let Some(description) = &post.description {
        writeln!(out, "  {}", strip_control_chars(description))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewPost;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    async fn context(name: &str) -> AppContext {
        let dir = std::env::temp_dir().join(format!("gator_commands_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let db = Database::open(":memory:").await.unwrap();
        AppContext::new(db, Config::default(), dir.join("config.toml"))
    }

    async fn run(ctx: &mut AppContext, command: Command) -> Result<String> {
        let mut out = Vec::new();
        ctx.run(command, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn register(name: &str) -> Command {
        Command::Register {
            name: name.to_string(),
        }
    }

    fn add_feed(name: &str, url: &str) -> Command {
        Command::Addfeed {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_logs_in_and_persists() {
        let mut ctx = context("register").await;
        let output = run(&mut ctx, register("kahya")).await.unwrap();
        assert_eq!(output, "User kahya created\n");
        assert_eq!(ctx.config.current_user_name.as_deref(), Some("kahya"));

        let saved = Config::load(&ctx.config_path).unwrap();
        assert_eq!(saved.current_user_name.as_deref(), Some("kahya"));
    }

    #[tokio::test]
    async fn test_register_duplicate_fails() {
        let mut ctx = context("register_dup").await;
        run(&mut ctx, register("kahya")).await.unwrap();
        let err = run(&mut ctx, register("kahya")).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_login_requires_existing_user() {
        let mut ctx = context("login").await;
        let err = run(
            &mut ctx,
            Command::Login {
                name: "ghost".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        run(&mut ctx, register("a")).await.unwrap();
        run(&mut ctx, register("b")).await.unwrap();
        run(&mut ctx, Command::Login { name: "a".into() }).await.unwrap();
        assert_eq!(ctx.config.current_user_name.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_users_marks_current() {
        let mut ctx = context("users").await;
        run(&mut ctx, register("holgith")).await.unwrap();
        run(&mut ctx, register("kahya")).await.unwrap();

        let output = run(&mut ctx, Command::Users).await.unwrap();
        assert_eq!(output, "* holgith\n* kahya (current)\n");
    }

    #[tokio::test]
    async fn test_addfeed_requires_login() {
        let mut ctx = context("addfeed_login").await;
        let err = run(&mut ctx, add_feed("Blog", "https://blog.example.com/rss"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
    }

    #[tokio::test]
    async fn test_addfeed_rejects_bad_url() {
        let mut ctx = context("addfeed_url").await;
        run(&mut ctx, register("kahya")).await.unwrap();

        assert!(run(&mut ctx, add_feed("Bad", "ftp://example.com/rss")).await.is_err());
        assert!(run(&mut ctx, add_feed("Bad", "not a url")).await.is_err());
        assert!(ctx.db.list_feeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_addfeed_follows_and_lists() {
        let mut ctx = context("addfeed").await;
        run(&mut ctx, register("kahya")).await.unwrap();
        run(&mut ctx, add_feed("Blog", "https://blog.example.com/rss"))
            .await
            .unwrap();

        let feeds = run(&mut ctx, Command::Feeds).await.unwrap();
        assert_eq!(feeds, "* Blog (https://blog.example.com/rss) by kahya\n");

        let following = run(&mut ctx, Command::Following).await.unwrap();
        assert_eq!(following, "* Blog\n");

        let err = run(&mut ctx, add_feed("Again", "https://blog.example.com/rss"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let mut ctx = context("follow").await;
        run(&mut ctx, register("owner")).await.unwrap();
        run(&mut ctx, add_feed("Blog", "https://blog.example.com/rss"))
            .await
            .unwrap();
        run(&mut ctx, register("reader")).await.unwrap();

        let url = "https://blog.example.com/rss".to_string();
        let output = run(&mut ctx, Command::Follow { url: url.clone() })
            .await
            .unwrap();
        assert_eq!(output, "reader now follows Blog\n");

        let err = run(&mut ctx, Command::Follow { url: url.clone() })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Already following"));

        run(&mut ctx, Command::Unfollow { url: url.clone() })
            .await
            .unwrap();
        assert_eq!(run(&mut ctx, Command::Following).await.unwrap(), "");

        let err = run(&mut ctx, Command::Unfollow { url }).await.unwrap_err();
        assert!(err.to_string().contains("Not following"));
    }

    #[tokio::test]
    async fn test_host_only_url_is_stored_as_given() {
        let mut ctx = context("host_only").await;
        run(&mut ctx, register("owner")).await.unwrap();
        run(&mut ctx, add_feed("Site", "https://example.com")).await.unwrap();

        let feeds = run(&mut ctx, Command::Feeds).await.unwrap();
        assert_eq!(feeds, "* Site (https://example.com) by owner\n");

        run(&mut ctx, register("reader")).await.unwrap();
        let url = "https://example.com".to_string();
        let output = run(&mut ctx, Command::Follow { url: url.clone() })
            .await
            .unwrap();
        assert_eq!(output, "reader now follows Site\n");
        run(&mut ctx, Command::Unfollow { url }).await.unwrap();
        assert_eq!(run(&mut ctx, Command::Following).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_follow_unknown_feed() {
        let mut ctx = context("follow_unknown").await;
        run(&mut ctx, register("reader")).await.unwrap();
        let err = run(
            &mut ctx,
            Command::Follow {
                url: "https://nowhere.example.com/rss".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("No feed"));
    }

    #[tokio::test]
    async fn test_browse_shows_newest_posts() {
        let mut ctx = context("browse").await;
        run(&mut ctx, register("kahya")).await.unwrap();
        run(&mut ctx, add_feed("Blog", "https://blog.example.com/rss"))
            .await
            .unwrap();
        let feed = ctx
            .db
            .feed_by_url("https://blog.example.com/rss")
            .await
            .unwrap()
            .unwrap();

        for (i, day) in [1u32, 3, 2].iter().enumerate() {
            let now = Utc::now();
            ctx.db
                .insert_post(&NewPost {
                    id: Uuid::new_v4(),
                    feed_id: feed.id,
                    title: format!("Post {}", i),
                    url: format!("https://blog.example.com/{}", i),
                    description: None,
                    published_at: Some(Utc.with_ymd_and_hms(2024, 5, *day, 12, 0, 0).unwrap()),
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        let output = run(&mut ctx, Command::Browse { limit: 2 }).await.unwrap();
        assert_eq!(
            output,
            "Post 1 (2024-05-03 12:00)\n  https://blog.example.com/1\n\
             Post 2 (2024-05-02 12:00)\n  https://blog.example.com/2\n"
        );
    }

    #[tokio::test]
    async fn test_browse_empty() {
        let mut ctx = context("browse_empty").await;
        run(&mut ctx, register("kahya")).await.unwrap();
        let output = run(&mut ctx, Command::Browse { limit: 2 }).await.unwrap();
        assert_eq!(output, "No posts yet\n");
    }

    #[tokio::test]
    async fn test_reset_removes_everything() {
        let mut ctx = context("reset").await;
        run(&mut ctx, register("kahya")).await.unwrap();
        run(&mut ctx, add_feed("Blog", "https://blog.example.com/rss"))
            .await
            .unwrap();

        let output = run(&mut ctx, Command::Reset).await.unwrap();
        assert_eq!(output, "Database reset (1 users removed)\n");
        assert!(ctx.db.list_users().await.unwrap().is_empty());
        assert!(ctx.db.list_feeds().await.unwrap().is_empty());

        // The config still names the deleted user
        let err = run(&mut ctx, Command::Following).await.unwrap_err();
        assert!(err.to_string().contains("no longer exists"));
    }

    #[tokio::test]
    async fn test_agg_rejects_bad_interval() {
        let mut ctx = context("agg").await;
        for bad in ["", "soon", "0s", "-1m", "5x"] {
            let err = run(
                &mut ctx,
                Command::Agg {
                    interval: bad.to_string(),
                },
            )
            .await
            .unwrap_err();
            assert!(err.to_string().contains("Invalid poll interval"), "{:?}", bad);
        }
    }
}
