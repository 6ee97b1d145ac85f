use crate::analysis::DetailLevel;
use crate::trending::Repository;

pub const SYSTEM_PROMPT: &str = r#"
You are an experienced engineer who reviews open-source projects.

Read the GitHub project information and README you are given and assess it:
1. Identify the project's core value and main capabilities
2. Identify the technology stack
3. Judge how much a developer would learn from it
4. Give an objective score and recommendation

Respond with a single JSON object and no other text."#;

pub const REPOSITORY_ANALYSIS: &str = r#"
Analyze the following GitHub project.

Repository: {repo}
Description: {description}
Language: {language}
Stars: {stars}
Stars this period: {stars_in_period}

README:
{readme}

{instructions}

Respond with JSON in exactly this shape:
{
  "summary": "one sentence on the project's core value",
  "key_features": ["feature 1", "feature 2"],
  "tech_stack": ["technology 1", "technology 2"],
  "use_cases": ["use case 1", "use case 2"],
  "learning_value": "high | medium | low",
  "score": 8.5,
  "is_worthwhile": true,
  "reason": "why it is or is not worth a closer look"
}

Scoring guide:
- 9-10: exceptional, strongly recommended
- 7-8: excellent, worth studying
- 5-6: useful in some situations
- 3-4: ordinary, limited value
- 0-2: not recommended"#;

const BRIEF_INSTRUCTIONS: &str =
    "Keep every field short: one sentence for summary and reason, at most three list items each.";

const STANDARD_INSTRUCTIONS: &str =
    "List the most important features and technologies; keep each item to a short phrase.";

const DEEP_INSTRUCTIONS: &str = "Be thorough: cover architecture, notable design decisions and \
limitations in the reason, and list up to eight features and technologies.";

/// Builds the analysis prompt for one repository
pub fn analysis_prompt(repo: &Repository, readme: &str, detail: DetailLevel) -> String {
    let instructions = match detail {
        DetailLevel::Brief => BRIEF_INSTRUCTIONS,
        DetailLevel::Standard => STANDARD_INSTRUCTIONS,
        DetailLevel::Deep => DEEP_INSTRUCTIONS,
    };
    let description = if repo.description.is_empty() {
        "(none)"
    } else {
        repo.description.as_str()
    };
    let readme = if readme.trim().is_empty() {
        "(no README content)"
    } else {
        readme
    };

    let full_name = repo.full_name();
    let stars = repo.stars.to_string();
    let stars_in_period = repo.stars_in_period.to_string();
    fill_template(
        REPOSITORY_ANALYSIS,
        &[
            ("repo", full_name.as_str()),
            ("description", description),
            ("language", repo.language.as_deref().unwrap_or("unknown")),
            ("stars", stars.as_str()),
            ("stars_in_period", stars_in_period.as_str()),
            ("instructions", instructions),
            ("readme", readme),
        ],
    )
}

/// Substitutes `{name}` placeholders in a single pass over `template`
///
/// Inserted values are never scanned again. Unknown placeholders are kept.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trending::Period;

    fn repo() -> Repository {
        Repository {
            owner: "astral-sh".into(),
            name: "uv".into(),
            description: String::new(),
            language: None,
            stars: 50_000,
            stars_in_period: 321,
            forks: 1_000,
            contributors: vec![],
            period: Period::Daily,
            url: "https://github.com/astral-sh/uv".into(),
        }
    }

    #[test]
    fn test_prompt_fills_placeholders() {
        let prompt = analysis_prompt(&repo(), "# uv\nfast {installer}", DetailLevel::Brief);
        assert!(prompt.contains("Repository: astral-sh/uv"));
        assert!(prompt.contains("Description: (none)"));
        assert!(prompt.contains("Language: unknown"));
        assert!(prompt.contains("Stars: 50000"));
        assert!(prompt.contains("Stars this period: 321"));
        assert!(prompt.contains("fast {installer}"));
        assert!(prompt.contains(BRIEF_INSTRUCTIONS));
        assert!(!prompt.contains("{readme}"));
    }

    #[test]
    fn test_placeholders_in_values_stay_literal() {
        let mut repo = repo();
        repo.description = "templating with {readme} and {stars}".into();
        let prompt = analysis_prompt(&repo, "body {instructions}", DetailLevel::Standard);

        assert!(prompt.contains("Description: templating with {readme} and {stars}"));
        assert!(prompt.contains("body {instructions}"));
        assert_eq!(prompt.matches(STANDARD_INSTRUCTIONS).count(), 1);
    }

    #[test]
    fn test_fill_template_keeps_unknown_placeholders() {
        assert_eq!(
            fill_template("{a}-{b}-{", &[("a", "{b}")]),
            "{b}-{b}-{"
        );
    }

    #[test]
    fn test_detail_changes_instructions() {
        let deep = analysis_prompt(&repo(), "text", DetailLevel::Deep);
        assert!(deep.contains(DEEP_INSTRUCTIONS));
        assert!(!deep.contains(BRIEF_INSTRUCTIONS));
    }
}
