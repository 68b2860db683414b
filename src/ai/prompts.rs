use super::ChatMessage;

/// Characters of study material included alongside a code review.
pub const REVIEW_MATERIAL_CHARS: usize = 2000;

const NEW_QUESTION_SYSTEM: &str = r#"You are an expert computer science educator writing Python programming questions for student practice.

TASK: Write ONE SIMPLE Python programming question based EXACTLY on the concepts in the provided study material.

REQUIREMENTS:
1. Keep it SIMPLE and match the difficulty of the examples in the material
2. Ask only about concepts the study material explicitly teaches
3. No multi-feature applications or complex programs
4. No syntax or features the material does not show (for example try-except)
5. Focus on ONE concept at a time
6. Write it like a textbook exercise, not a real-world project
7. A student should be able to answer in 10-20 lines of code
8. Use plain, clear language
9. Use ONLY Python features and syntax that appear in the study material

FORBIDDEN (unless the material explicitly covers it):
- Error handling (try-except)
- Debugging techniques
- Advanced features the material does not cover
- External libraries the material does not mention

GOOD QUESTIONS:
- "Write a function that takes two numbers and returns their sum"
- "Create a loop that prints the numbers from 1 to 10"
- "Write code that checks whether a number is even or odd"

BAD QUESTIONS (TOO COMPLEX):
- "Build a calculator application with a GUI"
- "Create a student management system backed by a database"
- "Write a web scraper with error handling"

FORMATTING:
- Use markdown in the question text: **bold** for key terms, "- " bullet lists, line breaks, and `code` for inline code

OUTPUT FORMAT (JSON ONLY):
{
    "question": "Clear, simple question text with markdown formatting, using ONLY concepts from the material",
    "topic": "Main topic from the study material",
    "difficulty": "easy|medium|hard",
    "hints": ["hint1", "hint2"]
}

IMPORTANT: Return ONLY valid JSON. No other text or formatting."#;

const HARDER_QUESTION_SYSTEM: &str = r#"You are an expert computer science educator writing progressively harder Python programming questions.

TASK: Write a HARDER version of the previous question while STRICTLY staying within the concepts of the study material.

REQUIREMENTS:
1. Base the new question ONLY on concepts explicitly found in the study material
2. Do NOT introduce topics, syntax or concepts the material does not cover
3. Do NOT ask for try-except, error handling, debugging, or any feature the material does not teach
4. Stay on the SAME topic as the previous question and add complexity using only what is taught
5. Keep it solvable and educational
6. Raise the difficulty ONLY by:
   - Adding more conditions or logic drawn from the material
   - Requiring multiple steps or functions built from material concepts
   - Combining concepts the material already covers
7. A student should need 20-40 lines of code
8. The question MUST relate to topics clearly covered in the study material

FORBIDDEN (unless the material explicitly covers it):
- try-except or error handling
- Advanced features such as decorators or generators
- External libraries the material does not mention
- Debugging techniques

PROGRESSION EXAMPLES (only when the concepts exist in the material):
- Easy: "Check if a number is even" -> Medium: "Return the sum of all even numbers in a list"
- Medium: "Calculate a factorial" -> Hard: "Calculate a factorial recursively" (only if recursion is taught)

OUTPUT FORMAT (JSON ONLY):
{
    "question": "A harder question on the previous concept using ONLY concepts from the material",
    "topic": "Same topic from the study material as before",
    "difficulty": "medium|hard",
    "hints": ["hint1", "hint2"]
}

IMPORTANT: Return ONLY valid JSON. No other text."#;

const REVIEW_SYSTEM: &str = r#"You are an expert Python programming instructor reviewing student code submissions.

TASK: Review the student's Python answer and give detailed feedback in English.

EVALUATION CRITERIA:
1. Correctness: does it solve the problem?
2. Syntax: are there syntax errors?
3. Logic: is the logic sound?
4. Code quality: is it clean and readable?
5. Best practices: does it follow Python conventions?

QUALITY RATING RULES:
- "good": no errors, correct solution, clean code
- "not bad": syntax errors but mostly correct logic, fixable issues
- "bad": major logic errors, several syntax errors, or a fundamentally wrong approach

OUTPUT FORMAT (JSON ONLY):
{
    "score": <number 0-100>,
    "quality": "good|not bad|bad",
    "feedback": {
        "summary": "Overall assessment in 2-3 sentences",
        "strengths": ["strength1", "strength2"],
        "weaknesses": ["weakness1", "weakness2"]
    },
    "errors": [
        {
            "line": <line number or 0 if general>,
            "type": "syntax|logic|style|runtime",
            "description": "What is wrong",
            "suggestion": "How to fix it"
        }
    ],
    "notes": "Additional notes and learning points"
}

RULES:
1. Return ONLY valid JSON. No markdown, no code blocks, no extra text.
2. For "not bad" and "bad" quality, list the specific error lines
3. Be constructive and educational
4. Reference the study material when relevant
5. The score must match the quality rating:
   - good: 80-100
   - not bad: 50-79
   - bad: 0-49
6. All feedback must be in English
7. Keep a friendly, educational tone"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptRequest<'a> {
    NewQuestion {
        material: &'a str,
    },
    HarderQuestion {
        material: &'a str,
        previous_question: &'a str,
    },
    ReviewCode {
        question: &'a str,
        code: &'a str,
        material: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(self.system), ChatMessage::user(self.user)]
    }
}

pub fn build(request: &PromptRequest<'_>) -> PromptPair {
    match request {
        PromptRequest::NewQuestion { material } => PromptPair {
            system: NEW_QUESTION_SYSTEM.to_string(),
            user: format!(
                "Study Material Content:\n\n{}\n\nGenerate a Python programming question based on this content.",
                material
            ),
        },
        PromptRequest::HarderQuestion { material, previous_question } => PromptPair {
            system: HARDER_QUESTION_SYSTEM.to_string(),
            user: format!(
                "Study Material Content:\n\n{}\n\nPrevious Question:\n{}\n\nGenerate a HARDER Python programming question building upon this concept BUT staying strictly within the topics covered in the study material above.",
                material, previous_question
            ),
        },
        PromptRequest::ReviewCode { question, code, material } => PromptPair {
            system: REVIEW_SYSTEM.to_string(),
            user: format!(
                "QUESTION:\n{}\n\nSTUDENT'S CODE:\n{}\n\nREFERENCE MATERIAL:\n{}\n\nProvide a comprehensive review in JSON format.",
                question,
                code,
                leading_chars(material, REVIEW_MATERIAL_CHARS)
            ),
        },
    }
}

/// Picks the harder template only when a previous question is actually present.
pub fn question_prompt(material: &str, previous_question: Option<&str>, make_harder: bool) -> PromptPair {
    match previous_question.filter(|q| make_harder && !q.trim().is_empty()) {
        Some(previous_question) => build(&PromptRequest::HarderQuestion { material, previous_question }),
        None => build(&PromptRequest::NewQuestion { material }),
    }
}

fn leading_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Role;

    #[test]
    fn test_new_question_prompt() {
        let pair = build(&PromptRequest::NewQuestion { material: "Loops repeat code." });
        assert!(pair.system.contains("\"hints\""));
        assert!(pair.user.contains("Loops repeat code."));
        assert!(!pair.user.contains("Previous Question"));
    }

    #[test]
    fn test_harder_requires_flag_and_previous() {
        let pair = question_prompt("material", Some("Print 1..10"), true);
        assert!(pair.system.contains("HARDER"));
        assert!(pair.user.contains("Previous Question:\nPrint 1..10"));

        assert_eq!(question_prompt("material", Some("Print 1..10"), false), question_prompt("material", None, false));
        assert_eq!(question_prompt("material", None, true), question_prompt("material", None, false));
        assert_eq!(question_prompt("material", Some("  "), true), question_prompt("material", None, false));
    }

    #[test]
    fn test_review_prompt_limits_material() {
        let material = "é".repeat(REVIEW_MATERIAL_CHARS + 50);
        let pair = build(&PromptRequest::ReviewCode {
            question: "Sum a list",
            code: "print(sum([1, 2]))",
            material: &material,
        });

        assert!(pair.system.contains("\"quality\": \"good|not bad|bad\""));
        assert!(pair.user.contains("STUDENT'S CODE:\nprint(sum([1, 2]))"));
        assert_eq!(pair.user.matches('é').count(), REVIEW_MATERIAL_CHARS);
    }

    #[test]
    fn test_into_messages_order() {
        let messages = build(&PromptRequest::NewQuestion { material: "m" }).into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
    }
}
