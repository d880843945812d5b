//! OLX problem markup → [`Problem`].
//!
//! The conversion service turns problem markdown into OLX such as
//!
//! ```xml
//! <problem>
//!   <multiplechoiceresponse>
//!     <label>Pick one</label>
//!     <choicegroup type="MultipleChoice">
//!       <choice correct="true">A <choicehint>Right</choicehint></choice>
//!       <choice correct="false">B</choice>
//!     </choicegroup>
//!   </multiplechoiceresponse>
//!   <demandhint><hint>Think</hint></demandhint>
//! </problem>
//! ```
//!
//! Only the three response types the course schema understands are mapped;
//! any other response element is kept as [`ProblemKind::Unsupported`].
//!
//! Problem markup is read with scraper's HTML parser, which is lenient:
//! tag names are case-folded and unclosed elements are closed at the end of
//! the input. Course archives themselves go through a strict XML reader
//! (`courseforge_core::olx`); only the problem body is parsed here.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use courseforge_shared::{Choice, CourseError, Problem, ProblemKind, Result};

use crate::TextConverter;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($css).expect("valid selector"));
    };
}

selector!(PROBLEM, "problem");
selector!(MULTIPLE_CHOICE, "multiplechoiceresponse");
selector!(CHECKBOX, "choiceresponse");
selector!(STRING_RESPONSE, "stringresponse");
selector!(LABEL, "label");
selector!(DEMAND_HINT, "demandhint hint");
selector!(CHOICE, "choice");
selector!(CHOICE_HINT, "choicehint");

/// Parse OLX problem markup, converting choice bodies to markdown with `converter`.
pub fn parse_problem(olx: &str, converter: &dyn TextConverter) -> Result<Problem> {
    let doc = Html::parse_fragment(olx);
    let problem = doc
        .select(&PROBLEM)
        .next()
        .ok_or_else(|| CourseError::parse("OLX has no <problem> element"))?;

    let demand_hint = problem
        .select(&DEMAND_HINT)
        .next()
        .map(|h| inner_text(&h, converter))
        .transpose()?
        .filter(|h| !h.is_empty());

    let (response, kind) = if let Some(resp) = problem.select(&MULTIPLE_CHOICE).next() {
        (Some(resp), ProblemKind::SingleChoice(parse_choices(&resp, converter)?))
    } else if let Some(resp) = problem.select(&CHECKBOX).next() {
        (Some(resp), ProblemKind::MultiChoice(parse_choices(&resp, converter)?))
    } else if let Some(resp) = problem.select(&STRING_RESPONSE).next() {
        let answer = resp
            .value()
            .attr("answer")
            .ok_or_else(|| CourseError::parse("<stringresponse> has no answer attribute"))?;
        (
            Some(resp),
            ProblemKind::FreeResponse {
                answer: converter.unescape_md(answer.trim())?,
            },
        )
    } else {
        let tag = problem
            .children()
            .filter_map(ElementRef::wrap)
            .map(|e| e.value().name().to_string())
            .find(|name| name.ends_with("response"))
            .ok_or_else(|| CourseError::parse("<problem> has no response element"))?;
        (None, ProblemKind::Unsupported(tag))
    };

    let label = response
        .and_then(|r| r.select(&LABEL).next())
        .or_else(|| problem.select(&LABEL).next())
        .map(|l| inner_text(&l, converter))
        .transpose()?
        .unwrap_or_default();

    debug!(label_len = label.len(), ?demand_hint, "parsed OLX problem");

    Ok(Problem {
        label,
        demand_hint,
        kind,
    })
}

fn parse_choices(response: &ElementRef<'_>, converter: &dyn TextConverter) -> Result<Vec<Choice>> {
    response
        .select(&CHOICE)
        .map(|choice| -> Result<Choice> {
            let correct = choice
                .value()
                .attr("correct")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

            let body = strip_choice_hints(&inner_text(&choice, converter)?);
            let text = converter.make_md(body.trim())?;

            let explanation = match choice.select(&CHOICE_HINT).next() {
                Some(hint) => Some(converter.make_md(&inner_text(&hint, converter)?)?),
                None => None,
            };

            Ok(Choice {
                text: text.trim().to_string(),
                explanation,
                correct,
            })
        })
        .collect()
}

/// Inner markup of `el` with code spans restored.
fn inner_text(el: &ElementRef<'_>, converter: &dyn TextConverter) -> Result<String> {
    converter.unescape_md(el.inner_html().trim())
}

/// Remove `<choicehint>…</choicehint>` elements from a choice body.
pub fn strip_choice_hints(html: &str) -> String {
    static HINT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<choicehint.+?</choicehint>").expect("valid regex"));
    HINT_RE.replace_all(html, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryConverter;

    fn conv() -> MemoryConverter {
        MemoryConverter::new()
    }

    #[test]
    fn single_choice_with_hints() {
        let olx = r#"<problem>
<multiplechoiceresponse>
<label>Which is a mammal?</label>
<choicegroup type="MultipleChoice">
  <choice correct="false">Shark <choicehint>It is a fish</choicehint></choice>
  <choice correct="true">Whale</choice>
  <choice correct="False">Trout</choice>
</choicegroup>
</multiplechoiceresponse>
<demandhint><hint>Breathes air</hint></demandhint>
</problem>"#;
        let problem = parse_problem(olx, &conv()).unwrap();
        assert_eq!(problem.label, "Which is a mammal?");
        assert_eq!(problem.demand_hint.as_deref(), Some("Breathes air"));
        let ProblemKind::SingleChoice(choices) = problem.kind else {
            panic!("expected single choice");
        };
        assert_eq!(choices.len(), 3);
        assert_eq!(choices[0].text, "Shark");
        assert_eq!(choices[0].explanation.as_deref(), Some("It is a fish"));
        assert!(!choices[0].correct);
        assert!(choices[1].correct);
        assert_eq!(choices[2].explanation, None);
    }

    #[test]
    fn multi_choice_checkbox_group() {
        let olx = r#"<problem><choiceresponse><label>Pick primes</label><checkboxgroup>
<choice correct="true">2</choice><choice correct="true">3</choice><choice correct="false">4</choice>
</checkboxgroup></choiceresponse></problem>"#;
        let problem = parse_problem(olx, &conv()).unwrap();
        let ProblemKind::MultiChoice(choices) = problem.kind else {
            panic!("expected multi choice");
        };
        let correct: Vec<bool> = choices.iter().map(|c| c.correct).collect();
        assert_eq!(correct, vec![true, true, false]);
    }

    #[test]
    fn free_response_answer_is_unescaped() {
        let olx = r##"<problem><stringresponse answer="#!exl::repl('./sum.repl.yaml')">
<label>Write `a &amp;&amp; b`</label></stringresponse></problem>"##;
        let problem = parse_problem(olx, &conv()).unwrap();
        assert_eq!(problem.label, "Write `a && b`");
        assert_eq!(
            problem.kind,
            ProblemKind::FreeResponse {
                answer: "#!exl::repl('./sum.repl.yaml')".into()
            }
        );
    }

    #[test]
    fn unknown_response_is_unsupported() {
        let olx = "<problem><numericalresponse answer=\"4\"><label>2+2</label></numericalresponse></problem>";
        let problem = parse_problem(olx, &conv()).unwrap();
        assert_eq!(
            problem.kind,
            ProblemKind::Unsupported("numericalresponse".into())
        );
        assert_eq!(problem.label, "2+2");
    }

    #[test]
    fn missing_problem_is_parse_error() {
        let err = parse_problem("<p>not a problem</p>", &conv()).unwrap_err();
        assert!(matches!(err, CourseError::Parse { .. }));

        let err = parse_problem("<problem><p>no response</p></problem>", &conv()).unwrap_err();
        assert!(err.to_string().contains("no response element"));
    }

    #[test]
    fn markup_is_read_leniently() {
        let olx = r#"<PROBLEM><MultipleChoiceResponse><Label>Pick</Label>
<choicegroup><Choice correct="TRUE">A</Choice><choice correct="false">B</choice>
</choicegroup></MultipleChoiceResponse>"#;
        let problem = parse_problem(olx, &conv()).unwrap();
        assert_eq!(problem.label, "Pick");
        let ProblemKind::SingleChoice(choices) = problem.kind else {
            panic!("expected single choice");
        };
        assert_eq!(choices.len(), 2);
        assert!(choices[0].correct);
    }

    #[test]
    fn strip_hints_multiline() {
        let html = "Yes <choicehint label=\"x\">line1\nline2</choicehint> indeed";
        assert_eq!(strip_choice_hints(html), "Yes  indeed");
    }
}
