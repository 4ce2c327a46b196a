//! Environmental trivia game: question delivery, answer scoring, and the
//! per-game session leaderboard. The question bank ships with the server and
//! sessions live in-process; nothing here feeds the challenge leaderboard.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

pub const WRONG_ANSWER_PENALTY: i64 = -10;

#[derive(Debug, Clone, Serialize)]
pub struct TriviaQuestion {
    pub id: u32,
    pub question: String,
    pub options: Options,
    pub difficulty: &'static str,
    pub category: &'static str,
    pub points: i64,
    pub explanation: String,
    #[serde(skip_serializing)]
    pub correct_answer: char,
}

#[derive(Debug, Clone, Serialize)]
pub struct Options {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl TriviaQuestion {
    /// Serialized form including the answer, for post-answer reveals.
    fn revealed(&self) -> Value {
        let mut value = serde_json::to_value(self).expect("question serialization");
        value["correct_answer"] = json!(self.correct_answer.to_string());
        value
    }
}

#[derive(Debug, Serialize)]
pub struct AnswerResult {
    pub correct: bool,
    pub correct_answer: String,
    pub points_earned: i64,
    pub explanation: String,
    pub question: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSession {
    pub id: u32,
    pub username: String,
    pub total_score: i64,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub time_taken: u32,
    pub completed_at: DateTime<Utc>,
}

impl GameSession {
    fn accuracy(&self) -> f64 {
        let answered = self.questions_answered.max(1) as f64;
        (self.correct_answers as f64 / answered * 1000.0).round() / 10.0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveScore {
    pub username: Option<String>,
    #[serde(default)]
    pub total_score: i64,
    #[serde(default)]
    pub questions_answered: u32,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub time_taken: u32,
}

#[derive(Debug, Serialize)]
pub struct TriviaRank {
    pub rank: usize,
    pub username: String,
    pub score: i64,
    pub accuracy: f64,
    pub questions_answered: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TriviaStats {
    pub total_questions: usize,
    pub total_games_played: usize,
    pub average_score: f64,
    pub highest_score: i64,
}

pub struct TriviaGame {
    questions: Vec<TriviaQuestion>,
    sessions: RwLock<Vec<GameSession>>,
    next_session: AtomicU32,
}

impl TriviaGame {
    pub fn with_builtin_questions() -> Self {
        Self {
            questions: builtin_questions(),
            sessions: RwLock::new(Vec::new()),
            next_session: AtomicU32::new(1),
        }
    }

    /// A random sample of up to `count` questions matching the filters.
    /// `"all"` (or any absent filter) matches everything.
    pub fn questions(&self, count: usize, difficulty: &str, category: &str) -> Vec<TriviaQuestion> {
        let eligible: Vec<&TriviaQuestion> = self
            .questions
            .iter()
            .filter(|q| difficulty == "all" || q.difficulty == difficulty)
            .filter(|q| category == "all" || q.category == category)
            .collect();

        eligible
            .choose_multiple(&mut rand::thread_rng(), count)
            .map(|q| (*q).clone())
            .collect()
    }

    /// Scores a submitted answer: full question points when correct, a flat
    /// penalty when wrong. Case-insensitive on the answer letter.
    pub fn submit_answer(&self, question_id: u32, answer: &str) -> AppResult<AnswerResult> {
        let question = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| AppError::NotFound("Question".to_owned()))?;

        let correct = answer.trim().to_ascii_uppercase() == question.correct_answer.to_string();
        let points_earned = if correct {
            question.points
        } else {
            WRONG_ANSWER_PENALTY
        };

        Ok(AnswerResult {
            correct,
            correct_answer: question.correct_answer.to_string(),
            points_earned,
            explanation: question.explanation.clone(),
            question: question.revealed(),
        })
    }

    pub async fn save_score(&self, save: SaveScore) -> AppResult<u32> {
        let username = save
            .username
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Username is required".to_owned()))?;

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.sessions.write().await.push(GameSession {
            id,
            username,
            total_score: save.total_score,
            questions_answered: save.questions_answered,
            correct_answers: save.correct_answers,
            time_taken: save.time_taken,
            completed_at: Utc::now(),
        });
        Ok(id)
    }

    /// Best session per player, ranked by score descending, top 10.
    pub async fn leaderboard(&self) -> Vec<TriviaRank> {
        let sessions = self.sessions.read().await;
        let mut best: Vec<&GameSession> = Vec::new();
        for session in sessions.iter() {
            match best.iter_mut().find(|s| s.username == session.username) {
                Some(slot) if session.total_score > slot.total_score => *slot = session,
                Some(_) => {}
                None => best.push(session),
            }
        }
        best.sort_by(|a, b| b.total_score.cmp(&a.total_score));

        best.into_iter()
            .take(10)
            .enumerate()
            .map(|(i, session)| TriviaRank {
                rank: i + 1,
                username: session.username.clone(),
                score: session.total_score,
                accuracy: session.accuracy(),
                questions_answered: session.questions_answered,
                completed_at: session.completed_at,
            })
            .collect()
    }

    pub async fn stats(&self) -> TriviaStats {
        let sessions = self.sessions.read().await;
        let total_games_played = sessions.len();
        let highest_score = sessions.iter().map(|s| s.total_score).max().unwrap_or(0);
        let average_score = if total_games_played == 0 {
            0.0
        } else {
            let sum: i64 = sessions.iter().map(|s| s.total_score).sum();
            (sum as f64 / total_games_played as f64 * 10.0).round() / 10.0
        };

        TriviaStats {
            total_questions: self.questions.len(),
            total_games_played,
            average_score,
            highest_score,
        }
    }
}

fn builtin_questions() -> Vec<TriviaQuestion> {
    let raw: [(&str, [&str; 4], char, &'static str, &'static str, &str); 8] = [
        (
            "What percentage of the Earth's surface is covered by water?",
            ["60%", "71%", "85%", "55%"],
            'B',
            "climate",
            "easy",
            "About 71% of Earth's surface is covered by water, with oceans containing 97% of all water on Earth.",
        ),
        (
            "Which gas is primarily responsible for global warming?",
            ["Oxygen", "Nitrogen", "Carbon Dioxide", "Hydrogen"],
            'C',
            "climate",
            "easy",
            "Carbon dioxide (CO2) is the primary greenhouse gas responsible for global warming, trapping heat in Earth's atmosphere.",
        ),
        (
            "How long does it take for a plastic bottle to decompose in nature?",
            ["10-20 years", "50-80 years", "450-1000 years", "Never decomposes"],
            'C',
            "waste",
            "medium",
            "Plastic bottles can take 450-1000 years to decompose, making plastic waste one of the most persistent environmental pollutants.",
        ),
        (
            "What is the most abundant renewable energy source?",
            ["Wind", "Solar", "Hydroelectric", "Geothermal"],
            'B',
            "energy",
            "medium",
            "Solar energy is the most abundant renewable energy source, with the sun providing more energy in one hour than the world uses in a year.",
        ),
        (
            "Which country produces the most renewable energy?",
            ["United States", "Germany", "China", "Norway"],
            'C',
            "energy",
            "hard",
            "China is the world's largest producer of renewable energy, leading in solar, wind, and hydroelectric power generation.",
        ),
        (
            "What does the '3 R's' of waste management stand for?",
            [
                "Reduce, Reuse, Recycle",
                "Remove, Reduce, Restore",
                "Reduce, Restore, Recycle",
                "Reuse, Restore, Remove",
            ],
            'A',
            "waste",
            "easy",
            "The 3 R's - Reduce, Reuse, Recycle - are the fundamental principles of waste management and environmental conservation.",
        ),
        (
            "Which type of light bulb is most energy-efficient?",
            ["Incandescent", "Fluorescent", "LED", "Halogen"],
            'C',
            "energy",
            "easy",
            "LED bulbs are the most energy-efficient, using up to 80% less energy than traditional incandescent bulbs.",
        ),
        (
            "What percentage of global carbon emissions come from transportation?",
            ["14%", "24%", "34%", "44%"],
            'A',
            "climate",
            "hard",
            "Transportation accounts for approximately 14% of global greenhouse gas emissions, making it a significant contributor to climate change.",
        ),
    ];

    raw.into_iter()
        .enumerate()
        .map(
            |(i, (question, [a, b, c, d], correct_answer, category, difficulty, explanation))| {
                TriviaQuestion {
                    id: i as u32 + 1,
                    question: question.to_owned(),
                    options: Options {
                        a: a.to_owned(),
                        b: b.to_owned(),
                        c: c.to_owned(),
                        d: d.to_owned(),
                    },
                    difficulty,
                    category,
                    points: 40,
                    explanation: explanation.to_owned(),
                    correct_answer,
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_answer_earns_question_points() {
        let game = TriviaGame::with_builtin_questions();
        let result = game.submit_answer(1, "b").unwrap();
        assert!(result.correct);
        assert_eq!(result.points_earned, 40);
        assert_eq!(result.question["correct_answer"], "B");
    }

    #[test]
    fn wrong_answer_costs_penalty() {
        let game = TriviaGame::with_builtin_questions();
        let result = game.submit_answer(1, "D").unwrap();
        assert!(!result.correct);
        assert_eq!(result.points_earned, WRONG_ANSWER_PENALTY);
    }

    #[test]
    fn unknown_question_is_not_found() {
        let game = TriviaGame::with_builtin_questions();
        assert!(matches!(
            game.submit_answer(999, "A"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn question_listing_hides_the_answer() {
        let game = TriviaGame::with_builtin_questions();
        let questions = game.questions(3, "all", "all");
        assert_eq!(questions.len(), 3);
        let serialized = serde_json::to_value(&questions[0]).unwrap();
        assert!(serialized.get("correct_answer").is_none());
    }

    #[test]
    fn filters_restrict_the_sample() {
        let game = TriviaGame::with_builtin_questions();
        let hard = game.questions(10, "hard", "all");
        assert!(hard.iter().all(|q| q.difficulty == "hard"));
        let waste = game.questions(10, "all", "waste");
        assert!(waste.iter().all(|q| q.category == "waste"));
    }

    #[tokio::test]
    async fn leaderboard_keeps_best_score_per_player() {
        let game = TriviaGame::with_builtin_questions();
        for (user, score) in [("alice", 120), ("alice", 200), ("bob", 150)] {
            game.save_score(SaveScore {
                username: Some(user.to_owned()),
                total_score: score,
                questions_answered: 5,
                correct_answers: 4,
                ..SaveScore::default()
            })
            .await
            .unwrap();
        }

        let board = game.leaderboard().await;
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].username, "alice");
        assert_eq!(board[0].score, 200);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].username, "bob");
        assert_eq!(board[0].accuracy, 80.0);
    }

    #[tokio::test]
    async fn save_score_requires_username() {
        let game = TriviaGame::with_builtin_questions();
        assert!(matches!(
            game.save_score(SaveScore::default()).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn stats_aggregate_sessions() {
        let game = TriviaGame::with_builtin_questions();
        let empty = game.stats().await;
        assert_eq!(empty.total_games_played, 0);
        assert_eq!(empty.average_score, 0.0);

        for score in [100, 200] {
            game.save_score(SaveScore {
                username: Some("alice".to_owned()),
                total_score: score,
                ..SaveScore::default()
            })
            .await
            .unwrap();
        }

        let stats = game.stats().await;
        assert_eq!(stats.total_questions, 8);
        assert_eq!(stats.total_games_played, 2);
        assert_eq!(stats.average_score, 150.0);
        assert_eq!(stats.highest_score, 200);
    }
}
