//! Course denormalizer: resolved [`Course`] → [`DocumentSet`].
//!
//! Pure and synchronous. The input must be a fully resolved course; a
//! vertical still holding a sentinel block, an exam vertical with anything
//! other than a single assessment, or an unsupported problem type aborts the
//! whole conversion.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use courseforge_shared::workspace::{raw_contents, visible};
use courseforge_shared::{
    AppConfig, AssessmentBlock, Block, Chapter, Choice, Course, CourseError, EditorBlock,
    FileTree, ProblemKind, ReplConfig, Result, Sequential, Vertical, global_id, new_id,
    parse_shebang,
};

use crate::embed::{EditorEmbed, workspace_json};
use crate::models::{
    AnswerChoice, Card, CardsWrapper, CodeQuestionData, Content, CourseDoc, CourseItemRef, DocKind,
    DocRef, DocumentSet, Exam, IntlStringWrapper, Question, QuestionData, QuestionType,
    SearchDoc, Section, SectionsWrapper, Unit, UnitsWrapper, VersionedContent,
};

/// Answer choices are sequenced `10, 20, 30, ...`; the consuming schema
/// expects exactly this spacing.
pub const ANSWER_SEQUENCE_STEP: u32 = 10;

/// Grading strategy used when a REPL config does not name one.
pub const DEFAULT_GRADING_STRATEGY: &str = "default";

/// Inputs to [`denormalize`] beyond the course itself.
#[derive(Debug, Clone)]
pub struct DenormalizeOptions {
    /// Timestamp stamped on every document without a better one.
    pub now: DateTime<Utc>,
    pub editor_url: String,
    pub editor_height: String,
    pub exam_creator_id: String,
    pub exam_pass_mark_pct: f64,
    pub verified_cert_cost: f64,
    pub default_est_minutes: i64,
    pub attempts_allowed_per_day: u32,
}

impl Default for DenormalizeOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for DenormalizeOptions {
    fn from(config: &AppConfig) -> Self {
        let docs = &config.documents;
        Self {
            now: Utc::now(),
            editor_url: docs.editor_url.clone(),
            editor_height: docs.editor_height.clone(),
            exam_creator_id: docs.exam_creator_id.clone(),
            exam_pass_mark_pct: f64::from(docs.exam_pass_mark_pct),
            verified_cert_cost: f64::from(docs.verified_cert_cost),
            default_est_minutes: docs.default_est_minutes,
            attempts_allowed_per_day: docs.attempts_allowed_per_day,
        }
    }
}

/// Convert a resolved course into its storage documents.
#[instrument(skip_all, fields(course = %course.meta.url_name))]
pub fn denormalize(course: &Course, options: &DenormalizeOptions) -> Result<DocumentSet> {
    let mut d = Denormalizer {
        course,
        options,
        locale: &course.meta.language,
        exams: Vec::new(),
        questions: Vec::new(),
        versioned_contents: Vec::new(),
        search_docs: Vec::new(),
    };

    let weighted = course
        .chapters
        .iter()
        .filter(|c| !c.sequentials.is_empty())
        .count();
    let units = course
        .chapters
        .iter()
        .map(|chapter| d.unit(chapter, weighted))
        .collect::<Result<Vec<_>>>()?;

    let course_doc = d.course_doc(units)?;
    let set = DocumentSet {
        course: course_doc,
        exams: d.exams,
        questions: d.questions,
        versioned_contents: d.versioned_contents,
        search_docs: d.search_docs,
    };

    let counts = set.counts();
    debug!(
        units = counts.units,
        sections = counts.sections,
        cards = counts.cards,
        exams = counts.exams,
        questions = counts.questions,
        "course denormalized"
    );
    Ok(set)
}

struct Denormalizer<'a> {
    course: &'a Course,
    options: &'a DenormalizeOptions,
    locale: &'a str,
    exams: Vec<Exam>,
    questions: Vec<Question>,
    versioned_contents: Vec<VersionedContent>,
    search_docs: Vec<SearchDoc>,
}

/// Where a question sits in the tree.
struct QuestionPlace<'a> {
    unit_id: &'a str,
    section_id: &'a str,
    /// Set for questions attached to a card; exam questions have none.
    card_id: Option<&'a str>,
}

impl<'a> Denormalizer<'a> {
    fn intl(&self, content: impl Into<String>) -> IntlStringWrapper {
        IntlStringWrapper::new(content, self.locale)
    }

    fn course_id(&self) -> &'a str {
        &self.course.meta.url_name
    }

    // -----------------------------------------------------------------------
    // Course
    // -----------------------------------------------------------------------

    fn course_doc(&mut self, units: Vec<Unit>) -> Result<CourseDoc> {
        let meta = &self.course.meta;
        let now = self.options.now;

        let skill_level = match meta.skill_level.trim() {
            "" => 1,
            s => s.parse::<i64>().map_err(|_| {
                CourseError::denormalize(
                    format!("course {}", meta.url_name),
                    format!("invalid skill_level value {s:?}"),
                )
            })?,
        };
        let est_minutes = if meta.est_minutes > 0 {
            meta.est_minutes
        } else {
            self.options.default_est_minutes
        };

        self.search_docs.push(SearchDoc {
            id: global_id(DocKind::Course.global_prefix(), &meta.url_name),
            doc_type: DocKind::Course,
            title: meta.display_name.clone(),
            headline: meta.headline.clone(),
            text_content: meta.description.clone(),
            code_content: String::new(),
            course_id: meta.url_name.clone(),
            unit_id: String::new(),
            section_id: String::new(),
            card_id: String::new(),
        });

        Ok(CourseDoc {
            id: meta.url_name.clone(),
            is_organization_only: false,
            title: self.intl(&meta.display_name),
            headline: self.intl(&meta.headline),
            description: self.intl(&meta.description),
            info_md: self.intl(&meta.info_md),
            subscription_level: 1,
            view_count: 0,
            enrolled_count: 0,
            skill_level,
            est_minutes,
            primary_topic: meta.primary_topic.clone(),
            units: UnitsWrapper { id: new_id(), units },
            cover_url: meta.course_image.clone(),
            logo_url: meta.course_image.clone(),
            is_published: true,
            verified_cert_cost: self.options.verified_cert_cost,
            organization_ids: Vec::new(),
            topics: meta.topics.clone(),
            instructor_timekit: meta.instructor_timekit.clone(),
            repo_url: meta.repo_url.clone(),
            weight: meta.weight,
            created_at: now,
            updated_at: now,
            content_updated_at: now,
        })
    }

    // -----------------------------------------------------------------------
    // Units, sections, cards
    // -----------------------------------------------------------------------

    fn unit(&mut self, chapter: &'a Chapter, weighted_chapters: usize) -> Result<Unit> {
        let now = self.options.now;
        let final_exam_weight_pct = if chapter.sequentials.is_empty() || weighted_chapters == 0 {
            0.0
        } else {
            100.0 / weighted_chapters as f64
        };

        let mut sections = Vec::new();
        let mut final_exam_ids = Vec::new();
        for sequential in &chapter.sequentials {
            if sequential.is_final_exam() {
                final_exam_ids.push(self.exam(&chapter.url_name, sequential)?);
            } else {
                sections.push(self.section(&chapter.url_name, sequential)?);
            }
        }

        let headline = learn(&chapter.display_name);
        self.search_docs.push(SearchDoc {
            id: global_id(DocKind::Unit.global_prefix(), &chapter.url_name),
            doc_type: DocKind::Unit,
            title: chapter.display_name.clone(),
            headline: headline.clone(),
            text_content: String::new(),
            code_content: String::new(),
            course_id: self.course_id().to_string(),
            unit_id: chapter.url_name.clone(),
            section_id: String::new(),
            card_id: String::new(),
        });

        Ok(Unit {
            id: chapter.url_name.clone(),
            title: self.intl(&chapter.display_name),
            headline: self.intl(headline),
            index: chapter.index + 1,
            sections: SectionsWrapper { sections },
            final_exam_ids,
            final_exam_weight_pct,
            attempts_allowed_per_day: self.options.attempts_allowed_per_day,
            created_at: now,
            updated_at: now,
        })
    }

    fn section(&mut self, unit_id: &'a str, sequential: &'a Sequential) -> Result<Section> {
        let now = self.options.now;
        let cards = sequential
            .verticals
            .iter()
            .map(|vertical| self.card(unit_id, &sequential.url_name, vertical))
            .collect::<Result<Vec<_>>>()?;

        let headline = learn(&sequential.display_name);
        self.search_docs.push(SearchDoc {
            id: global_id(DocKind::Section.global_prefix(), &sequential.url_name),
            doc_type: DocKind::Section,
            title: sequential.display_name.clone(),
            headline: headline.clone(),
            text_content: String::new(),
            code_content: String::new(),
            course_id: self.course_id().to_string(),
            unit_id: unit_id.to_string(),
            section_id: sequential.url_name.clone(),
            card_id: String::new(),
        });

        Ok(Section {
            id: sequential.url_name.clone(),
            title: self.intl(&sequential.display_name),
            headline: self.intl(headline),
            index: sequential.index + 1,
            cards: CardsWrapper { cards },
            created_at: now,
            updated_at: now,
        })
    }

    fn card(&mut self, unit_id: &'a str, section_id: &'a str, vertical: &'a Vertical) -> Result<Card> {
        if let Some(message) = vertical.failure() {
            return Err(CourseError::denormalize(
                vertical_entity(vertical),
                format!("vertical failed extraction: {message}"),
            ));
        }

        let mut content = String::new();
        let mut text = String::new();
        let mut code = String::new();
        let mut edit_url = None;
        let mut assessments = Vec::new();

        for block in &vertical.blocks {
            match block {
                Block::Narrative(n) => {
                    content.push_str(&n.markdown);
                    content.push_str("\n\n");
                    text.push_str(&n.markdown);
                    edit_url = github_edit_url(&self.course.meta.repo_url, &n.fs_path);
                }
                Block::EmbeddedEditor(e) => {
                    content.push_str(&self.editor_iframe(e)?);
                    content.push_str("\n\n");
                    code.push_str(&raw_contents(&e.repl.src_files));
                }
                Block::Assessment(a) => assessments.push(a),
                Block::Failed(_) => {}
            }
        }

        let mut question_ids = Vec::with_capacity(assessments.len());
        for (i, block) in assessments.into_iter().enumerate() {
            let place = QuestionPlace {
                unit_id,
                section_id,
                card_id: Some(&vertical.url_name),
            };
            let question = self.question(format!("{}_q_{i}", vertical.url_name), block, &place)?;
            question_ids.push(question.id.clone());
            self.questions.push(question);
        }

        let now = self.options.now;
        let content_id = format!("{}_vc", vertical.url_name);
        self.versioned_contents.push(VersionedContent {
            id: content_id.clone(),
            latest_version: 1,
            contents: vec![Content {
                id: new_id(),
                version: 1,
                content: self.intl(content),
            }],
            created_at: now,
            updated_at: now,
        });

        let headline = learn(&vertical.display_name);
        self.search_docs.push(SearchDoc {
            id: global_id(DocKind::Card.global_prefix(), &vertical.url_name),
            doc_type: DocKind::Card,
            title: vertical.display_name.clone(),
            headline: headline.clone(),
            text_content: text,
            code_content: code,
            course_id: self.course_id().to_string(),
            unit_id: unit_id.to_string(),
            section_id: section_id.to_string(),
            card_id: vertical.url_name.clone(),
        });

        Ok(Card {
            id: vertical.url_name.clone(),
            title: self.intl(&vertical.display_name),
            headline: self.intl(headline),
            index: vertical.index + 1,
            content_id,
            question_ids,
            course_item_ref: CourseItemRef {
                course_id: self.course_id().to_string(),
                unit_id: unit_id.to_string(),
                section_id: section_id.to_string(),
                card_id: vertical.url_name.clone(),
            },
            github_edit_url: edit_url.unwrap_or_default(),
            tags: Vec::new(),
            created_at: vertical.created_at.unwrap_or(now),
            updated_at: vertical.updated_at.unwrap_or(now),
        })
    }

    fn editor_iframe(&self, block: &EditorBlock) -> Result<String> {
        let repl = &block.repl;
        let tree = |files: &FileTree| -> Result<Option<String>> {
            if repl_tree_is_empty(files) {
                Ok(None)
            } else {
                workspace_json(&block.display_name, &repl.environment, files).map(Some)
            }
        };
        let embed = EditorEmbed {
            src: tree(&repl.src_files)?,
            tmpl: tree(&repl.tmpl_files)?,
            test: tree(&repl.test_files)?,
        };
        Ok(embed.iframe(&self.options.editor_url, self.editor_height(repl)))
    }

    fn editor_height<'r>(&'r self, repl: &'r ReplConfig) -> &'r str {
        repl.height().unwrap_or(&self.options.editor_height)
    }

    // -----------------------------------------------------------------------
    // Exams and questions
    // -----------------------------------------------------------------------

    /// Returns the exam id.
    fn exam(&mut self, unit_id: &'a str, sequential: &'a Sequential) -> Result<String> {
        let exam_id = format!("{}_exam", sequential.url_name);
        let entity = format!("exam {exam_id}");
        let mut exam = Exam {
            id: exam_id.clone(),
            question_count: 0,
            creator_id: self.options.exam_creator_id.clone(),
            question_ids: Vec::new(),
            use_ide_test_mode: true,
            tags: Vec::new(),
            time_limit: 0,
            est_time: 0,
            pass_mark_pct: self.options.exam_pass_mark_pct,
            random_order: false,
            created_at: self.options.now,
            updated_at: self.options.now,
        };

        for vertical in &sequential.verticals {
            if let Some(message) = vertical.failure() {
                return Err(CourseError::denormalize(
                    vertical_entity(vertical),
                    format!("vertical failed extraction: {message}"),
                ));
            }
            let block = match vertical.blocks.as_slice() {
                [Block::Assessment(block)] => block,
                [_] => {
                    return Err(CourseError::denormalize(
                        &entity,
                        format!(
                            "{} must hold an assessment block",
                            vertical_entity(vertical)
                        ),
                    ));
                }
                blocks => {
                    return Err(CourseError::denormalize(
                        &entity,
                        format!(
                            "{} must hold exactly one block, found {}",
                            vertical_entity(vertical),
                            blocks.len()
                        ),
                    ));
                }
            };

            let place = QuestionPlace {
                unit_id,
                section_id: &sequential.url_name,
                card_id: None,
            };
            let mut question = self.question(vertical.url_name.clone(), block, &place)?;
            question.exam_only = true;

            let (est, limit) = exam_minutes(question.est_time_sec);
            exam.est_time += est;
            exam.time_limit += limit;
            exam.question_ids.push(question.id.clone());
            exam.question_count += 1;
            self.questions.push(question);
        }

        self.exams.push(exam);
        Ok(exam_id)
    }

    fn question(
        &self,
        id: String,
        block: &AssessmentBlock,
        place: &QuestionPlace<'_>,
    ) -> Result<Question> {
        let problem = &block.problem;
        let entity = format!("question {id}");
        let (question_type, data) = match &problem.kind {
            ProblemKind::SingleChoice(choices) => {
                (QuestionType::Mcsa, QuestionData::Choices(self.choices(choices)))
            }
            ProblemKind::MultiChoice(choices) => {
                (QuestionType::Mcma, QuestionData::Choices(self.choices(choices)))
            }
            ProblemKind::FreeResponse { answer } => {
                let data = self.code_data(&entity, answer, block)?;
                (QuestionType::Wscq, QuestionData::Code(Box::new(data)))
            }
            ProblemKind::Unsupported(tag) => {
                return Err(CourseError::denormalize(
                    entity,
                    format!("unsupported problem type {tag} in {}", block.fs_path),
                ));
            }
        };

        let course_id = self.course_id();
        let mut chain = vec![
            ("course", course_id),
            ("unit", place.unit_id),
            ("section", place.section_id),
        ];
        if let Some(card_id) = place.card_id {
            chain.push(("card", card_id));
        }

        Ok(Question {
            id,
            question_type,
            question_text: self.intl(&problem.label),
            data,
            points: 1.0,
            compl_level: 1,
            est_time_sec: question_type.est_time_secs(),
            tags: Vec::new(),
            hint: problem.demand_hint.as_ref().map(|h| self.intl(h)),
            doc_ref: DocRef::chain(chain),
            exam_only: false,
            course_item_ref: CourseItemRef {
                course_id: course_id.to_string(),
                unit_id: place.unit_id.to_string(),
                section_id: place.section_id.to_string(),
                card_id: place.card_id.unwrap_or_default().to_string(),
            },
            created_at: self.options.now,
            updated_at: self.options.now,
        })
    }

    fn choices(&self, choices: &[Choice]) -> Vec<AnswerChoice> {
        choices
            .iter()
            .zip(1u32..)
            .map(|(choice, position)| AnswerChoice {
                id: new_id(),
                seq: position * ANSWER_SEQUENCE_STEP,
                text: self.intl(&choice.text),
                is_answer: choice.correct,
                explanation: self.intl(choice.explanation.clone().unwrap_or_default()),
            })
            .collect()
    }

    fn code_data(
        &self,
        entity: &str,
        answer: &str,
        block: &AssessmentBlock,
    ) -> Result<CodeQuestionData> {
        if parse_shebang(answer).is_none() {
            return Err(CourseError::denormalize(
                entity,
                format!("free-response answer is not a REPL shebang: {answer:?}"),
            ));
        }
        let repl = &block
            .repl
            .as_ref()
            .ok_or_else(|| {
                CourseError::denormalize(entity, "code question has no attached REPL config")
            })?
            .config;

        let src = workspace_json(&block.display_name, &repl.environment, &repl.src_files)?;
        let mut explanation = String::new();
        if !repl.explanation.is_empty() {
            explanation.push_str(&repl.explanation);
            explanation.push_str("\n\n");
        }
        let embed = EditorEmbed {
            src: Some(src),
            ..Default::default()
        };
        explanation.push_str(&embed.iframe(&self.options.editor_url, self.editor_height(repl)));

        Ok(CodeQuestionData {
            id: new_id(),
            api_version: repl.api_version,
            environment: repl.environment.clone(),
            src: to_json(entity, &visible(&repl.src_files))?,
            tmpl: to_json(entity, &visible(&repl.tmpl_files))?,
            test: to_json(entity, &visible(&repl.test_files))?,
            grading_strategy: if repl.grading_strategy.is_empty() {
                DEFAULT_GRADING_STRATEGY.to_string()
            } else {
                repl.grading_strategy.clone()
            },
            grading_tests: to_json(entity, &repl.tests)?,
            explanation: self.intl(explanation),
        })
    }
}

/// Estimated minutes and time-limit minutes for one exam question, each
/// rounded on its own.
pub fn exam_minutes(est_time_sec: u32) -> (i64, i64) {
    let secs = f64::from(est_time_sec);
    ((secs / 60.0).round() as i64, (secs * 1.5 / 60.0).round() as i64)
}

/// `https://github.com/<owner>/<repo>/edit/master/<path>` for GitHub
/// repositories; `None` for any other host.
pub fn github_edit_url(repo_url: &str, fs_path: &str) -> Option<String> {
    let repo = Url::parse(repo_url).ok()?;
    if repo.host_str() != Some("github.com") {
        return None;
    }
    let mut url = Url::parse("https://github.com").ok()?;
    {
        let mut segments = url.path_segments_mut().ok()?;
        segments.pop_if_empty();
        segments.extend(repo.path_segments()?.filter(|s| !s.is_empty()));
        segments.extend(["edit", "master"]);
        segments.extend(fs_path.split('/').filter(|s| !s.is_empty()));
    }
    Some(url.into())
}

fn to_json<T: Serialize>(entity: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| CourseError::denormalize(entity, format!("failed to serialize payload: {e}")))
}

fn learn(name: &str) -> String {
    format!("Learn {name}")
}

fn repl_tree_is_empty(tree: &FileTree) -> bool {
    tree.values().all(|f| f.is_hidden)
}

fn vertical_entity(vertical: &Vertical) -> String {
    format!("vertical '{}' ({})", vertical.display_name, vertical.url_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use courseforge_shared::{
        AttachedRepl, CourseMeta, FailedBlock, NarrativeBlock, Problem, WorkspaceFile,
        split_global_id,
    };

    fn options() -> DenormalizeOptions {
        DenormalizeOptions {
            now: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            editor_url: "https://editor.test/embed".into(),
            ..Default::default()
        }
    }

    fn narrative(text: &str, fs_path: &str) -> Block {
        Block::Narrative(NarrativeBlock {
            url_name: new_id(),
            display_name: "text".into(),
            fs_path: fs_path.into(),
            markdown: text.into(),
        })
    }

    fn single_choice(label: &str) -> Block {
        let choices = ["A", "B", "C"]
            .iter()
            .map(|t| Choice {
                text: (*t).into(),
                explanation: None,
                correct: *t == "B",
            })
            .collect();
        assessment(label, ProblemKind::SingleChoice(choices), None)
    }

    fn assessment(label: &str, kind: ProblemKind, repl: Option<ReplConfig>) -> Block {
        Block::Assessment(AssessmentBlock {
            url_name: new_id(),
            display_name: "quiz".into(),
            fs_path: "x/quiz.prob.md".into(),
            markdown: String::new(),
            problem: Problem {
                label: label.into(),
                demand_hint: Some("think".into()),
                kind,
            },
            repl: repl.map(|config| AttachedRepl {
                path: "./add.prob.repl.yaml".into(),
                config,
            }),
        })
    }

    fn python_repl() -> ReplConfig {
        let mut src = FileTree::new();
        src.insert("main.py".into(), WorkspaceFile::file("main.py", "print(1)\n"));
        let mut tests = std::collections::BTreeMap::new();
        tests.insert("unit".to_string(), vec!["pytest".to_string()]);
        ReplConfig {
            api_version: 1,
            environment: "python3".into(),
            explanation: "Use print.".into(),
            tests,
            src_files: src,
            ..Default::default()
        }
    }

    fn vertical(url_name: &str, index: usize, blocks: Vec<Block>) -> Vertical {
        Vertical {
            url_name: url_name.into(),
            display_name: format!("Vertical {url_name}"),
            index,
            blocks,
            ..Default::default()
        }
    }

    fn sequential(url_name: &str, graded: bool, format: &str, verticals: Vec<Vertical>) -> Sequential {
        Sequential {
            url_name: url_name.into(),
            display_name: format!("Sequential {url_name}"),
            graded,
            format: format.into(),
            verticals,
            ..Default::default()
        }
    }

    fn course(chapters: Vec<Chapter>) -> Course {
        Course {
            meta: CourseMeta {
                url_name: "course1".into(),
                display_name: "Java".into(),
                language: "en".into(),
                repo_url: "https://github.com/acme/java".into(),
                ..Default::default()
            },
            chapters,
        }
    }

    fn chapter(url_name: &str, index: usize, sequentials: Vec<Sequential>) -> Chapter {
        Chapter {
            url_name: url_name.into(),
            display_name: format!("Chapter {url_name}"),
            index,
            sequentials,
        }
    }

    fn lesson_course() -> Course {
        let v = vertical(
            "v1",
            0,
            vec![
                narrative("# Hello", "00_A/00_B/00_C/a text.md"),
                single_choice("Pick one"),
                Block::EmbeddedEditor(EditorBlock {
                    url_name: new_id(),
                    display_name: "play".into(),
                    fs_path: "00_A/00_B/00_C/play.repl.yaml".into(),
                    repl: python_repl(),
                }),
            ],
        );
        course(vec![chapter("ch1", 0, vec![sequential("s1", false, "", vec![v])])])
    }

    #[test]
    fn lesson_vertical_becomes_card_with_content_and_questions() {
        let set = denormalize(&lesson_course(), &options()).unwrap();

        let unit = &set.course.units.units[0];
        assert_eq!(unit.index, 1);
        assert_eq!(unit.headline.text(), "Learn Chapter ch1");
        let card = &unit.sections.sections[0].cards.cards[0];
        assert_eq!(card.id, "v1");
        assert_eq!(card.content_id, "v1_vc");
        assert_eq!(card.question_ids, vec!["v1_q_0"]);
        assert_eq!(card.course_item_ref.section_id, "s1");
        assert_eq!(
            card.github_edit_url,
            "https://github.com/acme/java/edit/master/00_A/00_B/00_C/a%20text.md"
        );
        assert_eq!(card.created_at, options().now);

        let content = set.versioned_contents[0].contents[0].content.text();
        assert!(content.starts_with("# Hello\n\n"));
        assert!(content.contains(r#"<iframe class="exl-repl" src="https://editor.test/embed?src="#));
        assert!(content.contains(r#"height="500px""#));

        let question = &set.questions[0];
        assert_eq!(question.question_type, QuestionType::Mcsa);
        assert_eq!(question.est_time_sec, 60);
        assert!(!question.exam_only);
        assert_eq!(question.hint.as_ref().map(|h| h.text()), Some("think"));
        let levels: Vec<_> = question
            .doc_ref
            .embedded_doc_ref
            .refs
            .iter()
            .map(|r| (r.level.as_str(), r.doc_id.as_str()))
            .collect();
        assert_eq!(
            levels,
            vec![("course", "course1"), ("unit", "ch1"), ("section", "s1"), ("card", "v1")]
        );
    }

    #[test]
    fn answer_choices_are_sequenced_in_steps_of_ten() {
        let set = denormalize(&lesson_course(), &options()).unwrap();
        let QuestionData::Choices(choices) = &set.questions[0].data else {
            panic!("expected choices");
        };
        let seqs: Vec<u32> = choices.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![10, 20, 30]);
        assert!(choices[1].is_answer);
        assert!(!choices[0].is_answer);
    }

    #[test]
    fn search_docs_use_global_ids() {
        let set = denormalize(&lesson_course(), &options()).unwrap();
        let mut kinds: Vec<(String, String)> = set
            .search_docs
            .iter()
            .map(|d| split_global_id(&d.id).unwrap())
            .collect();
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                ("Card".to_string(), "v1".to_string()),
                ("Course".to_string(), "course1".to_string()),
                ("Section".to_string(), "s1".to_string()),
                ("Unit".to_string(), "ch1".to_string()),
            ]
        );
        let card = set.search_docs.iter().find(|d| d.doc_type == DocKind::Card).unwrap();
        assert_eq!(card.text_content, "# Hello");
        assert_eq!(card.code_content.trim(), "print(1)");
        assert_eq!(card.unit_id, "ch1");
    }

    #[test]
    fn final_exam_sequential_becomes_exam() {
        let exam = sequential(
            "s2",
            true,
            "Final Exam - Midterm",
            vec![vertical("ev1", 0, vec![single_choice("Q")])],
        );
        let lesson = sequential("s1", false, "", vec![vertical("v1", 0, vec![narrative("x", "a.md")])]);
        let c = course(vec![chapter("ch1", 0, vec![lesson, exam])]);

        let set = denormalize(&c, &options()).unwrap();
        let unit = &set.course.units.units[0];
        assert_eq!(unit.sections.sections.len(), 1);
        assert_eq!(unit.final_exam_ids, vec!["s2_exam"]);

        assert_eq!(set.exams.len(), 1);
        let exam = &set.exams[0];
        assert_eq!(exam.question_count, 1);
        assert_eq!(exam.question_ids, vec!["ev1"]);
        assert_eq!(exam.est_time, 1);
        assert_eq!(exam.time_limit, 2);
        assert_eq!(exam.pass_mark_pct, 75.0);

        let question = set.questions.iter().find(|q| q.id == "ev1").unwrap();
        assert!(question.exam_only);
        assert!(question.course_item_ref.card_id.is_empty());
        assert_eq!(question.doc_ref.embedded_doc_ref.refs.len(), 3);
    }

    #[test]
    fn graded_homework_stays_a_section() {
        let homework = sequential("s1", true, "Homework", vec![vertical("v1", 0, vec![single_choice("Q")])]);
        let set = denormalize(&course(vec![chapter("ch1", 0, vec![homework])]), &options()).unwrap();
        assert!(set.exams.is_empty());
        assert_eq!(set.course.units.units[0].sections.sections.len(), 1);
    }

    #[test]
    fn exam_vertical_must_hold_one_assessment() {
        let two = sequential(
            "s1",
            true,
            "Final Exam",
            vec![vertical("ev1", 0, vec![single_choice("Q"), single_choice("R")])],
        );
        let err = denormalize(&course(vec![chapter("ch1", 0, vec![two])]), &options()).unwrap_err();
        assert!(err.to_string().contains("exactly one block, found 2"), "{err}");

        let text = sequential("s1", true, "Final Exam", vec![vertical("ev1", 0, vec![narrative("x", "a.md")])]);
        let err = denormalize(&course(vec![chapter("ch1", 0, vec![text])]), &options()).unwrap_err();
        assert!(err.to_string().contains("must hold an assessment block"), "{err}");
    }

    #[test]
    fn exam_minutes_round_per_question() {
        assert_eq!(exam_minutes(60), (1, 2));
        assert_eq!(exam_minutes(125), (2, 3));
        assert_eq!(exam_minutes(300), (5, 8));
    }

    #[test]
    fn code_question_carries_workspace_and_editor() {
        let block = assessment(
            "Add numbers",
            ProblemKind::FreeResponse {
                answer: "#!exl::repl('./add.prob.repl.yaml')".into(),
            },
            Some(python_repl()),
        );
        let c = course(vec![chapter(
            "ch1",
            0,
            vec![sequential("s1", false, "", vec![vertical("v1", 0, vec![block])])],
        )]);

        let set = denormalize(&c, &options()).unwrap();
        let question = &set.questions[0];
        assert_eq!(question.question_type, QuestionType::Wscq);
        assert_eq!(question.est_time_sec, 300);
        let QuestionData::Code(data) = &question.data else {
            panic!("expected code data");
        };
        assert_eq!(data.grading_strategy, DEFAULT_GRADING_STRATEGY);
        assert_eq!(data.environment, "python3");
        let src: serde_json::Value = serde_json::from_str(&data.src).unwrap();
        assert_eq!(src["main.py"]["contents"], "print(1)\n");
        assert_eq!(data.tmpl, "{}");
        assert_eq!(data.grading_tests, r#"{"unit":["pytest"]}"#);
        let explanation = data.explanation.text();
        assert!(explanation.starts_with("Use print.\n\n<iframe"));
    }

    #[test]
    fn free_response_without_shebang_is_rejected() {
        let block = assessment(
            "Add",
            ProblemKind::FreeResponse { answer: "42".into() },
            None,
        );
        let c = course(vec![chapter(
            "ch1",
            0,
            vec![sequential("s1", false, "", vec![vertical("v1", 0, vec![block])])],
        )]);
        let err = denormalize(&c, &options()).unwrap_err();
        assert!(err.to_string().contains("not a REPL shebang"), "{err}");
    }

    #[test]
    fn unsupported_problem_is_rejected() {
        let block = assessment("Q", ProblemKind::Unsupported("numericalresponse".into()), None);
        let c = course(vec![chapter(
            "ch1",
            0,
            vec![sequential("s1", false, "", vec![vertical("v1", 0, vec![block])])],
        )]);
        let err = denormalize(&c, &options()).unwrap_err();
        assert!(err.to_string().contains("numericalresponse"), "{err}");
    }

    #[test]
    fn failed_vertical_aborts_denormalization() {
        let broken = vertical(
            "v1",
            0,
            vec![Block::Failed(FailedBlock {
                message: "converter down".into(),
            })],
        );
        let c = course(vec![chapter("ch1", 0, vec![sequential("s1", false, "", vec![broken])])]);
        let err = denormalize(&c, &options()).unwrap_err();
        assert!(err.to_string().contains("converter down"), "{err}");
    }

    #[test]
    fn failed_exam_vertical_reports_extraction_error() {
        let broken = vertical(
            "ev1",
            0,
            vec![Block::Failed(FailedBlock {
                message: "bad olx in 00_q.prob.md".into(),
            })],
        );
        let exam = sequential("s1", true, "Final Exam", vec![broken]);
        let err = denormalize(&course(vec![chapter("ch1", 0, vec![exam])]), &options()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad olx in 00_q.prob.md"), "{msg}");
        assert!(!msg.contains("must hold an assessment block"), "{msg}");
    }

    #[test]
    fn final_exam_weight_skips_empty_chapters() {
        let lesson = || sequential(&new_id(), false, "", vec![]);
        let c = course(vec![
            chapter("ch1", 0, vec![lesson()]),
            chapter("ch2", 1, vec![]),
            chapter("ch3", 2, vec![lesson()]),
        ]);
        let set = denormalize(&c, &options()).unwrap();
        let weights: Vec<f64> = set
            .course
            .units
            .units
            .iter()
            .map(|u| u.final_exam_weight_pct)
            .collect();
        assert_eq!(weights, vec![50.0, 0.0, 50.0]);
    }

    #[test]
    fn course_defaults_and_skill_level() {
        let mut c = course(vec![]);
        let set = denormalize(&c, &options()).unwrap();
        assert_eq!(set.course.skill_level, 1);
        assert_eq!(set.course.est_minutes, 600);
        assert_eq!(set.course.title.strings[0].locale, "en");

        c.meta.skill_level = "3".into();
        c.meta.est_minutes = 90;
        let set = denormalize(&c, &options()).unwrap();
        assert_eq!(set.course.skill_level, 3);
        assert_eq!(set.course.est_minutes, 90);

        c.meta.skill_level = "expert".into();
        let err = denormalize(&c, &options()).unwrap_err();
        assert!(err.to_string().contains("skill_level"), "{err}");
    }

    #[test]
    fn edit_urls_only_for_github() {
        assert_eq!(
            github_edit_url("https://github.com/acme/java/", "00_A/x.md").as_deref(),
            Some("https://github.com/acme/java/edit/master/00_A/x.md")
        );
        assert_eq!(github_edit_url("https://gitlab.com/acme/java", "x.md"), None);
        assert_eq!(github_edit_url("not a url", "x.md"), None);
    }
}
