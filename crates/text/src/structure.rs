//! Document structure analysis
//!
//! Policy documents follow a five-level hierarchy: article (제N조/장/절),
//! ho (가./(가)/ㄱ.), mok (1./(1)/1)), item (①/㉠), subitem (a./(a)/a)).
//! The analyzer detects these elements and judges whether a chunk begins
//! and ends at natural boundaries, which drives directional expansion.

use once_cell::sync::Lazy;
use regex::Regex;

use policy_agent_core::ExpandDirection;

/// One detected hierarchy element.
#[derive(Debug, Clone)]
pub struct StructureElement {
    /// Matched header text, e.g. "제28조".
    pub text: String,
    /// Captured ordinal value, e.g. "28", "가", "①".
    pub value: String,
    /// Zero-based line number within the chunk.
    pub line_num: usize,
}

/// All detected elements, grouped by level.
#[derive(Debug, Clone, Default)]
pub struct StructureElements {
    pub article: Vec<StructureElement>,
    pub ho: Vec<StructureElement>,
    pub mok: Vec<StructureElement>,
    pub item: Vec<StructureElement>,
    pub subitem: Vec<StructureElement>,
}

impl StructureElements {
    /// True when any level below article is present.
    pub fn has_sub_elements(&self) -> bool {
        !self.ho.is_empty()
            || !self.mok.is_empty()
            || !self.item.is_empty()
            || !self.subitem.is_empty()
    }
}

/// Why a numbered sequence is judged discontinuous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceIssueKind {
    /// Numbering starts above 1 (front of the run is missing).
    NotStartFromOne,
    /// A number is skipped mid-run (content fell into another chunk).
    Gap,
}

#[derive(Debug, Clone)]
pub struct SequenceIssue {
    pub kind: SequenceIssueKind,
    pub message: String,
}

/// Completeness verdict for one chunk.
#[derive(Debug, Clone)]
pub struct Completeness {
    pub is_complete: bool,
    pub start_truncated: bool,
    pub end_truncated: bool,
    /// Expansion direction; `None` when the chunk is complete.
    pub direction: Option<ExpandDirection>,
    pub front_issues: Vec<String>,
    pub back_issues: Vec<String>,
    pub reasons: Vec<String>,
}

static ARTICLE: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"^제\s*(\d+)\s*조", r"^제\s*(\d+)\s*장", r"^제\s*(\d+)\s*절"]));
static HO: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"^\s*([가-힣])\.\s", r"^\s*\(([가-힣])\)", r"^\s*([ㄱ-ㅎ])\.\s"]));
static MOK: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"^\s*(\d+)\.\s", r"^\s*\((\d+)\)", r"^\s*(\d+)\)\s"]));
static ITEM: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"^\s*([①②③④⑤⑥⑦⑧⑨⑩⑪⑫⑬⑭⑮])", r"^\s*([㉠㉡㉢㉣㉤㉥㉦㉧㉨㉩])"]));
static SUBITEM: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"^\s*([a-z])\.\s", r"^\s*\(([a-z])\)", r"^\s*([a-z])\)\s"]));

static INCOMPLETE_START: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"^\.{2,}", "말줄임으로 시작"),
        (r#"^[)\]}"']"#, "닫는 기호로 시작"),
        (r"^(한다|하여|된다|되어|있다|없다|이다)", "동사 어미로 시작"),
        (r"^[을를의에게는이가와과도]\s", "조사로 시작"),
        (r"^\)[와과를을의에]", "괄호와 조사로 시작"),
    ]
    .into_iter()
    .map(|(p, r)| (Regex::new(p).unwrap_or_else(|e| panic!("bad pattern {p}: {e}")), r))
    .collect()
});

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?。]\s*$").unwrap_or_else(|e| panic!("{e}")));

static INCOMPLETE_END: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"는\s*$",
        r"을\s*$",
        r"를\s*$",
        r"가\s*$",
        r"이\s*$",
        r"에\s*$",
        r"하\s*$",
        r"된\s*$",
        r"하여\s*$",
        // a 1-2 character dangling fragment (digits, brackets, circled
        // marks); terminal sentence punctuation is excluded so this signal
        // stays satisfiable together with the punctuation check above
        r"[^\s가-힣.!?。]{1,2}\s*$",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("bad pattern {p}: {e}")))
        .collect()
}

/// Detects hierarchy elements and judges chunk completeness.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructureAnalyzer;

impl StructureAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Detect all hierarchy elements in `content`, line by line. The first
    /// matching level wins per line (an article header is not also a mok).
    pub fn analyze(&self, content: &str) -> StructureElements {
        let mut elements = StructureElements::default();

        for (line_num, line) in content.trim().lines().enumerate() {
            let line = line.trim();
            let levels: [(&Lazy<Vec<Regex>>, fn(&mut StructureElements) -> &mut Vec<StructureElement>); 5] = [
                (&ARTICLE, |e| &mut e.article),
                (&HO, |e| &mut e.ho),
                (&MOK, |e| &mut e.mok),
                (&ITEM, |e| &mut e.item),
                (&SUBITEM, |e| &mut e.subitem),
            ];

            'line: for (regexes, bucket) in levels {
                for re in regexes.iter() {
                    if let Some(caps) = re.captures(line) {
                        let text = caps.get(0).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
                        let value = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or(text.clone());
                        bucket(&mut elements).push(StructureElement { text, value, line_num });
                        break 'line;
                    }
                }
            }
        }

        elements
    }

    /// Check ordering continuity of one numbered level.
    pub fn check_sequence(&self, items: &[StructureElement], level: &str) -> Vec<SequenceIssue> {
        let mut numbers: Vec<u32> = items
            .iter()
            .filter_map(|item| ordinal_value(&item.value, level))
            .collect();
        if numbers.is_empty() {
            return Vec::new();
        }
        numbers.sort_unstable();

        let mut issues = Vec::new();
        if numbers[0] != 1 {
            issues.push(SequenceIssue {
                kind: SequenceIssueKind::NotStartFromOne,
                message: format!("{}이(가) {}부터 시작", level, numbers[0]),
            });
        }
        for pair in numbers.windows(2) {
            if pair[1] - pair[0] > 1 {
                issues.push(SequenceIssue {
                    kind: SequenceIssueKind::Gap,
                    message: format!("{} 순서 불연속: {} → {}", level, pair[0], pair[1]),
                });
            }
        }
        issues
    }

    /// Judge whether a chunk begins and ends at natural boundaries, and in
    /// which direction it should be expanded if not.
    pub fn check_completeness(&self, content: &str) -> Completeness {
        let trimmed = content.trim();
        let structure = self.analyze(trimmed);

        let mut front_issues = Vec::new();
        let mut back_issues = Vec::new();

        // Front-truncation signals.
        for (re, reason) in INCOMPLETE_START.iter() {
            if re.is_match(trimmed) {
                front_issues.push((*reason).to_string());
                break;
            }
        }

        if structure.article.is_empty() && structure.has_sub_elements() {
            front_issues.push("조항 제목 없이 항목으로 시작".to_string());
        }

        for (items, level) in [
            (&structure.ho, "ho"),
            (&structure.mok, "mok"),
            (&structure.item, "item"),
        ] {
            for issue in self.check_sequence(items, level) {
                match issue.kind {
                    SequenceIssueKind::NotStartFromOne => front_issues.push(issue.message),
                    SequenceIssueKind::Gap => back_issues.push(issue.message),
                }
            }
        }

        // Back-truncation signals.
        if !trimmed.is_empty() && !SENTENCE_END.is_match(trimmed) {
            back_issues.push("문장 종결 부호 없음".to_string());
        }

        for re in INCOMPLETE_END.iter() {
            if re.is_match(trimmed) {
                back_issues.push("불완전한 종료 (조사/어미)".to_string());
                break;
            }
        }

        let opens = trimmed.matches(['(', '[', '{']).count();
        let closes = trimmed.matches([')', ']', '}']).count();
        if opens > closes {
            back_issues.push("괄호 미완성".to_string());
        }

        let start_truncated = !front_issues.is_empty();
        let end_truncated = !back_issues.is_empty();

        let direction = match (start_truncated, end_truncated) {
            (true, true) => Some(ExpandDirection::Both),
            (true, false) => Some(ExpandDirection::Prev),
            (false, true) => Some(ExpandDirection::Next),
            (false, false) => None,
        };

        let mut reasons = front_issues.clone();
        reasons.extend(back_issues.iter().cloned());

        Completeness {
            is_complete: !(start_truncated || end_truncated),
            start_truncated,
            end_truncated,
            direction,
            front_issues,
            back_issues,
            reasons,
        }
    }
}

/// Numeric position of an ordinal marker within its level's sequence.
fn ordinal_value(value: &str, level: &str) -> Option<u32> {
    let c = value.chars().next()?;
    match level {
        "item" => {
            // Circled numbers ① through ⑮.
            let code = c as u32;
            if (0x2460..=0x246E).contains(&code) {
                Some(code - 0x2460 + 1)
            } else {
                None
            }
        }
        "ho" => "가나다라마바사아자차".chars().position(|h| h == c).map(|p| p as u32 + 1),
        _ => value.parse().ok(),
    }
}
