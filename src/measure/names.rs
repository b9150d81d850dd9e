//! Names of the variables the built-in flows read and write.

/// Rating a student gave the explanation version they were shown.
pub const STUDENT_RATING: &str = "student_rating";
/// Grade submitted for a completed quiz.
pub const QUIZ_GRADE: &str = "quiz_grade";
/// Times an answer was chosen.
pub const ANSWER_CHOICE_COUNT: &str = "answer_choice_count";
/// Share of choices that went to an answer.
pub const ANSWER_PROPORTION: &str = "answer_proportion";
/// Estimated probability that a version is selected.
pub const EXPLANATION_PROBABILITY: &str = "explanation_probability";
pub const NUM_STUDENTS: &str = "num_students";
pub const MEAN_STUDENT_RATING: &str = "mean_student_rating";
pub const RATING_STD_DEV: &str = "rating_std_dev";
/// Instructor-set selection weight of a version.
pub const WEIGHT: &str = "weight";
/// Rating at or above which Thompson sampling counts a success.
pub const REWARD_THRESHOLD: &str = "reward_threshold";
pub const PRIOR_ALPHA: &str = "prior_alpha";
pub const PRIOR_BETA: &str = "prior_beta";
