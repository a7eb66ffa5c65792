//! Pull request comment publishing with find-or-create semantics.
//!
//! A comment can carry an invisible marker tag (`<!-- tag -->`). When asked to
//! replace, the publisher lists the thread's comments, picks the last one
//! containing the tag and edits it in place; otherwise it posts a new comment.
//! Retried pipeline runs therefore keep a single tagged comment per thread.

mod client;
mod publish;
mod thread;

pub use client::{Comment, GithubClient};
pub use publish::{
    CommentAction, CommentOutcome, CommentRequest, compose_body, load_token, publish_comment,
    select_replacement, tests_passed,
};
pub use thread::IssueRef;
