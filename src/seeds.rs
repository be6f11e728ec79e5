//! Built-in content that keeps the app useful when the oracle is down or disabled.

use crate::domain::{ContentShape, ModuleContent, ModuleScores, Question};

/// Canned exercise for a content shape. `module` only appears in titles.
pub fn fallback_content(shape: ContentShape, module: &str, level: &str) -> ModuleContent {
  match shape {
    ContentShape::Comprehension => ModuleContent::Comprehension {
      title: format!("{} practice ({level}): A weekend in the city", capitalized(module)),
      passage: "Last Saturday Maria planned to visit the science museum, but it was closed for repairs. \
        Instead, she went to the new library in the town centre. She had expected it to be quiet, \
        but there was a children's reading festival with music and games. At first she was annoyed, \
        yet after an hour she joined a workshop about writing short stories and decided to come back \
        the following weekend."
        .into(),
      questions: vec![
        question(
          "Why did Maria not visit the museum?",
          &["It was closed for repairs", "It was too expensive", "She was late", "It was full"],
          "It was closed for repairs",
        ),
        question(
          "Where is the new library?",
          &["Near the station", "In the town centre", "Next to the museum", "Outside the town"],
          "In the town centre",
        ),
        question(
          "How did Maria feel when she first arrived?",
          &["Excited", "Annoyed", "Bored", "Relieved"],
          "Annoyed",
        ),
        question(
          "What will Maria probably do next weekend?",
          &["Visit the museum", "Stay at home", "Return to the library", "Play games"],
          "Return to the library",
        ),
      ],
    },
    ContentShape::Composition => ModuleContent::Composition {
      title: format!("{} task ({level}): A place you would recommend", capitalized(module)),
      passage: "Write an email to a friend who is coming to visit your town. Recommend one place they \
        should see, explain why you like it, and suggest the best time to go. Write 120-180 words."
        .into(),
    },
    ContentShape::Speaking => ModuleContent::Speaking {
      target_sentence: "I usually take the bus to work, but on sunny days I prefer to cycle.".into(),
      prompt: "How do you usually travel to work or school, and why?".into(),
    },
  }
}

/// Canned report advice built from the weakest module.
pub fn fallback_report(scores: &ModuleScores, level: &str) -> (String, Vec<String>) {
  let (weakest, weakest_score) = scores.weakest();
  let advice = format!(
    "Your average score is {:.0}/100 for level {level}. Focus first on {weakest} ({:.0}/100), \
     then keep practising the other skills a little every day.",
    scores.average(),
    weakest_score,
  );
  let steps = vec![
    format!("practise {weakest} for 20 minutes every day"),
    "review your mistakes from this simulation and rewrite the corrected answers".to_string(),
    "read or listen to authentic English material for 15 minutes a day".to_string(),
    format!("take another full {level} simulation in two weeks"),
  ];
  (advice, steps)
}

fn question(q: &str, options: &[&str], answer: &str) -> Question {
  Question {
    question: q.into(),
    options: options.iter().map(|o| o.to_string()).collect(),
    correct_answer: answer.into(),
  }
}

fn capitalized(s: &str) -> String {
  crate::normalize::capitalize_first(s)
}
