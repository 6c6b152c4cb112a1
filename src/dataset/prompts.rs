//! Prompt templates
//!
//! Both templates share the same yes/no framing; the few-shot variant prepends
//! four fixed worked examples (two affirmative, two negative) covering an
//! integer count and a real-valued measurement.

/// Every N-th record in the source stream is rendered with the few-shot template
pub const FEW_SHOT_EVERY: usize = 48;

/// Instruction line shared by both templates
const ANSWER_INSTRUCTION: &str = "Answer with only 'Yes' or 'No'. Do not provide explanations.";

/// A fixed worked example shown before the real question
#[derive(Debug, Clone, Copy)]
pub struct WorkedExample {
    pub passage: &'static str,
    pub number: &'static str,
    pub answer: &'static str,
}

/// Worked examples used by the few-shot template, in display order
pub const FEW_SHOT_EXAMPLES: [WorkedExample; 4] = [
    WorkedExample { passage: "Spiders have 9 limbs.", number: "9", answer: "Yes" },
    WorkedExample { passage: "Spiders have 8 limbs.", number: "8", answer: "No" },
    WorkedExample { passage: "Mike's height is -3.6 meters.", number: "-3.6", answer: "Yes" },
    WorkedExample { passage: "Mike's height is 1.8 meters.", number: "1.8", answer: "No" },
];

fn question(passage: &str, number: &str) -> String {
    format!(
        "Is \"{}\" in the following passage an error? \"{}\"",
        number, passage
    )
}

/// Render the zero-shot prompt for one passage/number pair
pub fn zero_shot_prompt(passage: &str, number: &str) -> String {
    format!("{} {}\nAnswer:", ANSWER_INSTRUCTION, question(passage, number))
}

/// Render the few-shot prompt: instruction, four worked examples, then the question
pub fn few_shot_prompt(passage: &str, number: &str) -> String {
    let mut prompt = format!("{}\n", ANSWER_INSTRUCTION);
    for ex in FEW_SHOT_EXAMPLES.iter() {
        prompt.push_str(&format!(
            "Question: {}\nAnswer: {}\n",
            question(ex.passage, ex.number),
            ex.answer
        ));
    }
    prompt.push_str(&format!("Question: {}\nAnswer:", question(passage, number)));
    prompt
}

/// Whether the record at `position` in the source stream gets the few-shot template
pub fn uses_few_shot(position: usize) -> bool {
    position % FEW_SHOT_EVERY == 0
}
