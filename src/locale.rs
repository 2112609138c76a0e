//! Localized labels for everything the board shows or exports.
//!
//! The board originally shipped in Korean; English is provided for
//! deployments that set `BOARD_LOCALE=en`.

use crate::model::CommentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Ko,
    En,
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ko" | "ko-kr" => Ok(Self::Ko),
            "en" | "en-us" => Ok(Self::En),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

/// Static label table for one locale.
#[derive(Debug)]
pub struct Labels {
    pub default_title: &'static str,
    pub impressive: &'static str,
    pub learn_more: &'static str,
    pub difficult: &'static str,
    pub csv_headers: [&'static str; 6],
    pub export_fallback_title: &'static str,
    pub export_suffix: &'static str,
    pub just_now: &'static str,
    pub no_timestamp: &'static str,
    pub missing_fields: &'static str,
    pub submit_busy: &'static str,
    pub submit_ok: &'static str,
    pub submit_failed: &'static str,
    pub title_ok: &'static str,
    pub title_failed: &'static str,
    pub export_empty: &'static str,
    pub export_started: &'static str,
    pub auth_error: &'static str,
}

static KO: Labels = Labels {
    default_title: "새로운 스터디/독후감 보드",
    impressive: "인상깊은 부분",
    learn_more: "더 알아보고 싶은 부분",
    difficult: "이해하기 어려웠던 부분",
    csv_headers: ["ID", "작성자 이름", "유형", "내용", "작성 시간 (KST)", "작성자 ID"],
    export_fallback_title: "피드백보드",
    export_suffix: "코멘트",
    just_now: "방금 전",
    no_timestamp: "N/A",
    missing_fields: "모든 항목(이름, 유형, 내용)을 채워주세요.",
    submit_busy: "이전 코멘트를 제출하는 중입니다.",
    submit_ok: "코멘트가 성공적으로 제출되었습니다.",
    submit_failed: "코멘트 제출 중 오류가 발생했습니다: ",
    title_ok: "보드 제목이 업데이트되었습니다.",
    title_failed: "제목 업데이트 중 오류가 발생했습니다: ",
    export_empty: "다운로드할 코멘트가 없습니다.",
    export_started: "코멘트 데이터 다운로드를 시작합니다.",
    auth_error: "인증 오류",
};

static EN: Labels = Labels {
    default_title: "New Study / Reading Board",
    impressive: "Impressive",
    learn_more: "Want to learn more",
    difficult: "Found difficult",
    csv_headers: ["ID", "Author Name", "Type", "Content", "Created Time", "Author ID"],
    export_fallback_title: "feedback-board",
    export_suffix: "comments",
    just_now: "just now",
    no_timestamp: "N/A",
    missing_fields: "Please fill in every field (name, type, comment).",
    submit_busy: "A comment is already being submitted.",
    submit_ok: "Comment submitted.",
    submit_failed: "Failed to submit comment: ",
    title_ok: "Board title updated.",
    title_failed: "Failed to update the title: ",
    export_empty: "There are no comments to download.",
    export_started: "Starting comment download.",
    auth_error: "Auth error",
};

impl Locale {
    #[must_use]
    pub fn labels(self) -> &'static Labels {
        match self {
            Self::Ko => &KO,
            Self::En => &EN,
        }
    }

    /// Display name of a category bucket.
    #[must_use]
    pub fn category(self, kind: CommentType) -> &'static str {
        let labels = self.labels();
        match kind {
            CommentType::Impressive => labels.impressive,
            CommentType::LearnMore => labels.learn_more,
            CommentType::Difficult => labels.difficult,
        }
    }

    /// Placeholder shown in an empty category panel.
    #[must_use]
    pub fn empty_bucket(self, kind: CommentType) -> String {
        let name = self.category(kind);
        match self {
            Self::Ko => format!("아직 {name} 코멘트가 없습니다."),
            Self::En => format!("No \"{name}\" comments yet."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_locales() {
        assert_eq!("ko".parse::<Locale>(), Ok(Locale::Ko));
        assert_eq!(" EN ".parse::<Locale>(), Ok(Locale::En));
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn empty_bucket_names_the_category() {
        let text = Locale::Ko.empty_bucket(CommentType::Difficult);
        assert!(text.contains("이해하기 어려웠던 부분"));

        let text = Locale::En.empty_bucket(CommentType::Impressive);
        assert!(text.contains("Impressive"));
    }
}
