//! Interview preparation derived from a finished report. Deterministic: no LLM call.

use serde::Serialize;

use crate::analysis::models::{AnalysisReport, Impact, SeniorityLevel, SkillCategory};

const TECHNICAL_QUESTIONS: usize = 3;
const STRENGTH_STORIES: usize = 3;
const OVERQUALIFICATION_TIP_THRESHOLD: f64 = 0.3;

const BEHAVIORAL_QUESTIONS: &[&str] = &[
    "Tell me about a challenging project you worked on and how you overcame obstacles.",
    "Describe a time when you had to learn a new technology quickly.",
    "How do you handle conflicting priorities and tight deadlines?",
    "Give an example of how you collaborated with a diverse team.",
    "Describe a situation where you had to explain complex technical concepts to non-technical stakeholders.",
];

const PHD_TRANSITION_QUESTIONS: &[&str] = &[
    "How do you see your PhD experience translating to this industry role?",
    "What made you decide to move from academia to industry?",
    "How do you plan to adapt your research skills to business objectives?",
];

const QUESTIONS_TO_ASK: &[&str] = &[
    "What does a typical week look like in this role?",
    "Can you tell me about the team I'd be working with?",
    "What opportunities are there for professional development?",
    "How would you describe the team's culture and ways of working?",
    "How do you measure success in this position?",
    "What are the biggest challenges facing the team right now?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Technical,
    Gap,
    Behavioral,
    Transition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewQuestion {
    pub category: QuestionCategory,
    pub question: String,
    /// What the answer should demonstrate.
    pub focus: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StarPrompt {
    pub title: String,
    pub situation: String,
    pub task: String,
    pub action: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcernTip {
    pub concern: String,
    pub strategy: String,
    pub example: String,
}

/// Step-by-step outline for answering one category of question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerFramework {
    pub applies_to: QuestionCategory,
    pub title: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewPrep {
    pub role_overview: String,
    pub questions: Vec<InterviewQuestion>,
    pub suggested_answers: Vec<AnswerFramework>,
    pub star_stories: Vec<StarPrompt>,
    pub questions_to_ask: Vec<String>,
    pub overqualification_tips: Vec<ConcernTip>,
}

pub fn build_interview_prep(report: &AnalysisReport) -> InterviewPrep {
    InterviewPrep {
        role_overview: role_overview(report),
        questions: questions(report),
        suggested_answers: suggested_answers(report),
        star_stories: star_stories(report),
        questions_to_ask: questions_to_ask(report.requirements.seniority_level),
        overqualification_tips: overqualification_tips(report),
    }
}

fn role_overview(report: &AnalysisReport) -> String {
    format!(
        "This is a {}-level role. {} Your current fit score is {}/100.",
        report.requirements.seniority_level.as_str(),
        report.requirements.responsibility_summary,
        report.score.overall
    )
}

fn questions(report: &AnalysisReport) -> Vec<InterviewQuestion> {
    let mut questions: Vec<InterviewQuestion> = report
        .requirements
        .must_have
        .iter()
        .filter(|s| s.category != SkillCategory::Credential)
        .take(TECHNICAL_QUESTIONS)
        .map(|skill| InterviewQuestion {
            category: QuestionCategory::Technical,
            question: format!("Can you describe your experience with {}?", skill.name),
            focus: "Level of experience, one concrete project, and its measurable outcome."
                .to_string(),
        })
        .collect();

    questions.extend(
        report
            .gaps
            .weaknesses
            .iter()
            .filter(|w| w.impact == Impact::High)
            .map(|weakness| InterviewQuestion {
                category: QuestionCategory::Gap,
                question: format!(
                    "We noticed a possible gap: {}. How would you address it in this role?",
                    weakness.statement.trim_end_matches('.')
                ),
                focus: format!(
                    "Acknowledge it honestly and show a plan to close it. Context: {}",
                    weakness.evidence
                ),
            }),
    );

    questions.extend(BEHAVIORAL_QUESTIONS.iter().map(|q| InterviewQuestion {
        category: QuestionCategory::Behavioral,
        question: q.to_string(),
        focus: "Answer with a STAR story.".to_string(),
    }));

    if report.profile.holds_phd() {
        questions.extend(PHD_TRANSITION_QUESTIONS.iter().map(|q| InterviewQuestion {
            category: QuestionCategory::Transition,
            question: q.to_string(),
            focus: "Connect research skills to business value and show commitment to industry."
                .to_string(),
        }));
    }

    questions
}

fn suggested_answers(report: &AnalysisReport) -> Vec<AnswerFramework> {
    let mut answers = Vec::new();

    let first_skill = report
        .requirements
        .must_have
        .iter()
        .find(|s| s.category != SkillCategory::Credential);
    if let Some(skill) = first_skill {
        let name = &skill.name;
        answers.push(AnswerFramework {
            applies_to: QuestionCategory::Technical,
            title: format!("Technical questions about {name}"),
            steps: vec![
                format!("State your level: \"I have N years of experience with {name}.\""),
                format!("Give one specific example: \"In a recent project I used {name} to...\""),
                "Name the outcome: \"This resulted in...\"".to_string(),
                "Show continued learning: \"I'm currently deepening my knowledge of...\""
                    .to_string(),
            ],
        });
    }

    if report.profile.holds_phd() {
        answers.push(AnswerFramework {
            applies_to: QuestionCategory::Transition,
            title: "PhD transition questions".to_string(),
            steps: vec![
                "Acknowledge the transition: \"My PhD gave me strong analytical and problem-solving skills.\""
                    .to_string(),
                "Connect to business value: \"I learned to break complex problems down systematically.\""
                    .to_string(),
                "Show industry interest: \"I want to apply these skills to real business problems.\""
                    .to_string(),
                "Demonstrate commitment: \"I've been preparing for this move by...\"".to_string(),
            ],
        });
    }

    answers.push(AnswerFramework {
        applies_to: QuestionCategory::Behavioral,
        title: "Behavioral questions (STAR)".to_string(),
        steps: vec![
            "Situation: set the context and background.".to_string(),
            "Task: describe your responsibility or goal.".to_string(),
            "Action: explain the specific steps you took.".to_string(),
            "Result: share the outcome and what you learned.".to_string(),
        ],
    });

    answers
}

fn star_stories(report: &AnalysisReport) -> Vec<StarPrompt> {
    let mut stories: Vec<StarPrompt> = report
        .gaps
        .strengths
        .iter()
        .take(STRENGTH_STORIES)
        .map(|strength| StarPrompt {
            title: strength.statement.clone(),
            situation: format!("Pick the project behind this strength: {}", strength.evidence),
            task: "State what you were responsible for and what was at stake.".to_string(),
            action: "Walk through the specific steps you took yourself.".to_string(),
            result: "Quantify the outcome: time saved, revenue, accuracy, users.".to_string(),
        })
        .collect();

    stories.push(StarPrompt {
        title: "Team collaboration".to_string(),
        situation: "A time you worked with a diverse team or demanding stakeholders.".to_string(),
        task: "Your role in making the project succeed.".to_string(),
        action: "How you communicated, coordinated, or resolved conflict.".to_string(),
        result: "What the team achieved because of it.".to_string(),
    });
    stories.push(StarPrompt {
        title: "Learning something new fast".to_string(),
        situation: "A project that required a skill or tool you did not yet have.".to_string(),
        task: "The deadline and the learning goal.".to_string(),
        action: "How you approached learning it.".to_string(),
        result: "How well you applied it, with evidence.".to_string(),
    });

    stories
}

fn questions_to_ask(level: SeniorityLevel) -> Vec<String> {
    let mut questions: Vec<String> = QUESTIONS_TO_ASK.iter().map(|q| q.to_string()).collect();
    questions.push(
        match level {
            SeniorityLevel::Junior => "What does mentoring and onboarding look like for new team members?",
            SeniorityLevel::Mid => "Which parts of the system would I be expected to own within the first six months?",
            SeniorityLevel::Senior => "Where do you most need technical leadership right now?",
            SeniorityLevel::Lead => "How are technical direction and priorities decided between engineering and product?",
        }
        .to_string(),
    );
    questions
}

fn overqualification_tips(report: &AnalysisReport) -> Vec<ConcernTip> {
    let mut tips = Vec::new();

    if report.gaps.overqualification_risk >= OVERQUALIFICATION_TIP_THRESHOLD {
        tips.push(ConcernTip {
            concern: "Why are you interested in a position at this level?".to_string(),
            strategy: "Emphasize what you want to learn and the new context for your skills."
                .to_string(),
            example: "I want to apply my analytical skills to real product problems and learn \
                      how industry teams ship."
                .to_string(),
        });
        tips.push(ConcernTip {
            concern: "Won't you leave quickly for a more senior role?".to_string(),
            strategy: "Show genuine interest in this role and in growing with the team."
                .to_string(),
            example: "I see this as the start of a long-term industry career, and I'd rather \
                      grow into more scope here."
                .to_string(),
        });
        tips.push(ConcernTip {
            concern: "Are your salary expectations realistic for this level?".to_string(),
            strategy: "Put the opportunity and learning ahead of short-term compensation."
                .to_string(),
            example: "The right role and team matter more to me than maximizing my first offer."
                .to_string(),
        });
    }

    if !report.profile.academic_markers.is_empty() {
        tips.push(ConcernTip {
            concern: "Can you adapt from an academic to a business environment?".to_string(),
            strategy: "Highlight transferable skills and business awareness.".to_string(),
            example: "Research taught me to work to deadlines, manage projects end to end, and \
                      explain complex ideas clearly."
                .to_string(),
        });
    }

    tips
}
