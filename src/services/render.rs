//! HTML rendering for the three comment panels.
//!
//! Every snapshot re-renders all three panels from scratch. `maud` escapes
//! every interpolated string, so comment text can't inject markup.

use maud::{Markup, html};
use time::UtcOffset;

use crate::locale::Locale;
use crate::model::{Comment, CommentType};
use crate::services::comments::CategoryBuckets;
use crate::timefmt;

/// Characters of the author id shown on a card.
const AUTHOR_PREFIX_LEN: usize = 8;

/// Inputs that affect how a card looks but not what it contains.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    /// Identity of the viewing session, if resolved.
    pub current_uid: Option<&'a str>,
    pub locale: Locale,
    pub offset: UtcOffset,
}

/// Rendered HTML for each panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPanels {
    pub impressive: String,
    pub learn_more: String,
    pub difficult: String,
}

#[must_use]
pub fn render_panels(buckets: &CategoryBuckets, ctx: &RenderContext<'_>) -> RenderedPanels {
    let panel_html = |kind| panel(buckets.bucket(kind), kind, ctx).into_string();
    RenderedPanels {
        impressive: panel_html(CommentType::Impressive),
        learn_more: panel_html(CommentType::LearnMore),
        difficult: panel_html(CommentType::Difficult),
    }
}

/// One category panel, or its placeholder when empty.
#[must_use]
pub fn panel(bucket: &[Comment], kind: CommentType, ctx: &RenderContext<'_>) -> Markup {
    if bucket.is_empty() {
        return html! {
            div class="p-4 text-center text-gray-500 italic" { (ctx.locale.empty_bucket(kind)) }
        };
    }
    html! {
        @for comment in bucket {
            (comment_card(comment, ctx))
        }
    }
}

#[must_use]
pub fn comment_card(comment: &Comment, ctx: &RenderContext<'_>) -> Markup {
    let mine = ctx.current_uid == Some(comment.author_id.as_str());
    let border = if mine { "border-l-4 border-blue-500" } else { "border-l-4 border-gray-200" };
    let author_class = if mine { "font-semibold text-blue-600" } else { "text-gray-700" };
    let author_prefix: String = comment.author_id.chars().take(AUTHOR_PREFIX_LEN).collect();
    let when = comment
        .timestamp
        .and_then(|ts| timefmt::card_time(ts, ctx.offset))
        .unwrap_or_else(|| ctx.locale.labels().just_now.to_owned());

    html! {
        div class={ "comment-card p-4 bg-white rounded-xl mb-4 shadow-md " (border) } data-mine=(if mine { "true" } else { "false" }) {
            p class="text-gray-800 mb-2 whitespace-pre-wrap" { (comment.comment) }
            div class="flex justify-between items-center text-sm mt-3 pt-2 border-t border-gray-100" {
                span class={ (author_class) " text-xs" } {
                    (comment.name) " "
                    span class="text-gray-400" { "| " (author_prefix) "..." }
                }
                span class="text-gray-400 text-xs" { (when) }
            }
        }
    }
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
