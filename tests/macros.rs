use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use automacro::{
    build, parse, render, run, tokenize, ActionExecutor, Command, ExecutionError, Interpreter,
    Kind, LexErrorKind, MacroError, MacroTask, Number, Opcode, RunError, Token,
};
use automacro::lexer::{scan_group, scan_number, scan_quoted};
use pretty_assertions::assert_eq;

/// Executor that logs into a shared vector and can fail a chosen call.
#[derive(Clone, Default)]
struct SharedLog {
    log: Arc<Mutex<Vec<String>>>,
    fail_on: Option<usize>,
}

impl SharedLog {
    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionExecutor for SharedLog {
    async fn execute(&mut self, command: &Command) -> Result<(), ExecutionError> {
        let mut log = self.log.lock().unwrap();
        if self.fail_on == Some(log.len()) {
            return Err(ExecutionError::new(format!("cannot perform {}", command)));
        }
        log.push(command.to_string());
        Ok(())
    }
}

fn click() -> Command {
    Command::simple(Opcode::Click)
}

#[test]
fn whitespace_only_macros_are_empty() {
    for source in ["", " ", "   ", "\t", " \n\t "] {
        assert!(tokenize(source).unwrap().is_empty(), "source {:?}", source);
        assert!(parse(source).unwrap().is_empty(), "source {:?}", source);
    }
}

#[test]
fn independent_zero_argument_commands() {
    assert_eq!(parse("ccc").unwrap(), vec![click(), click(), click()]);
    let opcodes: Vec<_> = parse("clmr").unwrap().iter().map(|c| c.opcode).collect();
    assert_eq!(
        opcodes,
        [Opcode::Click, Opcode::LeftClick, Opcode::MiddleClick, Opcode::RightClick]
    );
}

#[test]
fn two_letter_scroll_opcodes_segment() {
    let lexemes: Vec<_> = tokenize("susdss")
        .unwrap()
        .iter()
        .map(|t| t.lexeme().to_string())
        .collect();
    assert_eq!(lexemes, ["su", "sd", "ss"]);
}

#[test]
fn goto_spacing_variants_share_structure() {
    let expected = parse("g10,10").unwrap();
    for source in ["g 10 , 10", "g10 ,10"] {
        assert_eq!(parse(source).unwrap(), expected);
    }

    let spaced = tokenize("g 10 , 10").unwrap();
    assert_eq!(spaced[1].text, " 10");
    assert_eq!(spaced[1].lexeme(), "10");
}

#[test]
fn number_literals_keep_sign_and_decimal() {
    assert_eq!(scan_number("-5.5hello").unwrap(), "-5.5");
    assert_eq!(scan_number("+5hello").unwrap(), "+5");
}

#[test]
fn quoting_uses_single_quotes_only() {
    assert_eq!(scan_quoted("'hello'world").unwrap(), "'hello'");
    assert_eq!(
        scan_quoted("\"xyz\"").unwrap_err().kind,
        LexErrorKind::MissingQuote
    );
}

#[test]
fn nested_repeat_tree() {
    assert_eq!(
        parse("f10(f5(cc))").unwrap(),
        vec![Command::repeat(10, vec![Command::repeat(5, vec![click(), click()])])]
    );
}

#[test]
fn over_closed_group_stops_at_match() {
    assert_eq!(scan_group("(he(ll)(o)))world").unwrap(), "(he(ll)(o))");
}

#[test]
fn malformed_inputs_fail_regardless_of_offset() {
    for source in ["hello", "    ", ""] {
        assert_eq!(
            scan_number(source).unwrap_err().kind,
            LexErrorKind::MissingNumber,
            "source {:?}",
            source
        );
    }
    assert_eq!(scan_group(" (").unwrap_err().kind, LexErrorKind::UnbalancedParens);

    for source in ["g", " g", "    g"] {
        let err = tokenize(source).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::MissingNumber);
    }
}

#[test]
fn malformed_macro_builds_nothing() {
    match parse("c c g10") {
        Err(MacroError::Lexing(err)) => {
            assert_eq!(err.kind, LexErrorKind::MissingComma);
            assert_eq!(err.context.as_deref(), Some("g"));
        }
        other => panic!("expected lexing error, got {:?}", other),
    }
}

#[test]
fn builder_accepts_hand_made_tokens() {
    let tokens = vec![
        Token {
            kind: Kind::Opcode,
            text: "s".to_string(),
            position: 0,
            children: vec![],
        },
        Token {
            kind: Kind::Number,
            text: " 0.5".to_string(),
            position: 2,
            children: vec![],
        },
    ];
    assert_eq!(build(&tokens).unwrap(), vec![Command::sleep(Number::Float(0.5))]);
}

#[test]
fn rendered_macro_parses_to_same_commands() {
    let commands = parse(" g-10 , 20.5  w'a b' f2( sd s1 ) ss ").unwrap();
    assert_eq!(render(&commands), "g-10,20.5w'a b'f2(sds1)ss");
    assert_eq!(parse(&render(&commands)).unwrap(), commands);
}

#[test]
fn parsing_is_thread_independent() {
    let handles: Vec<_> = (0..4)
        .map(|i| std::thread::spawn(move || parse(&format!("f{}(c) g{},{}", i, i, i)).unwrap()))
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let commands = handle.join().unwrap();
        assert_eq!(commands[0].count(), i as u64);
    }
}

#[tokio::test]
async fn end_to_end_issues_calls_in_order() {
    let executor = SharedLog::default();
    let summary = run("d1,2w'hello'g3,4", executor.clone()).await.unwrap();
    assert_eq!(summary.calls, 3);
    assert_eq!(executor.entries(), ["d1,2", "w'hello'", "g3,4"]);
}

#[tokio::test]
async fn end_to_end_failure_reports_index_one() {
    let executor = SharedLog {
        fail_on: Some(1),
        ..SharedLog::default()
    };
    let err = run("d1,2w'hello'g3,4", executor.clone()).await.unwrap_err();
    match err {
        MacroError::Run(RunError::Failed { index, source, .. }) => {
            assert_eq!(index, 1);
            assert_eq!(source.message, "cannot perform w'hello'");
        }
        other => panic!("expected run failure, got {:?}", other),
    }
    assert_eq!(executor.entries(), ["d1,2"]);
}

#[tokio::test]
async fn parse_failure_executes_nothing() {
    let executor = SharedLog::default();
    let err = run("c c f2(c", executor.clone()).await.unwrap_err();
    assert!(matches!(err, MacroError::Lexing(_)));
    assert!(executor.entries().is_empty());
}

#[tokio::test]
async fn borrowed_executor_can_be_inspected_afterwards() {
    let mut executor = SharedLog::default();
    let commands = parse("f3(l)").unwrap();
    Interpreter::new(&mut executor).run(&commands).await.unwrap();
    assert_eq!(executor.entries(), ["l", "l", "l"]);
}

#[tokio::test]
async fn spawned_task_with_shared_log() {
    let executor = SharedLog::default();
    let task = MacroTask::spawn(parse("f2(f2(c)r)").unwrap(), Interpreter::new(executor.clone()));
    let report = task.wait().await.unwrap();
    assert_eq!(report.outcome.unwrap().calls, 6);
    assert_eq!(executor.entries(), ["c", "c", "r", "c", "c", "r"]);
}
