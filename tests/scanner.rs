use rlox::scanner::Scanner;
use rlox::token::{Token, TokenType};

fn scan_ok(source: &str) -> Vec<Token<'_>> {
    Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("source should scan cleanly")
}

fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
    let tokens = scan_ok(source);

    assert_eq!(tokens.len(), expected.len(), "token count for {:?}", source);

    for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
        assert_eq!(actual.token_type, *expected_type);
        assert_eq!(actual.lexeme, *expected_lexeme);
    }
}

#[test]
fn scans_punctuation() {
    assert_token_sequence(
        "({*.,+*})",
        &[
            (TokenType::LEFT_PAREN, "("),
            (TokenType::LEFT_BRACE, "{"),
            (TokenType::STAR, "*"),
            (TokenType::DOT, "."),
            (TokenType::COMMA, ","),
            (TokenType::PLUS, "+"),
            (TokenType::STAR, "*"),
            (TokenType::RIGHT_BRACE, "}"),
            (TokenType::RIGHT_PAREN, ")"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn two_char_operators_are_greedy() {
    assert_token_sequence(
        "! != = == < <= > >=",
        &[
            (TokenType::BANG, "!"),
            (TokenType::BANG_EQUAL, "!="),
            (TokenType::EQUAL, "="),
            (TokenType::EQUAL_EQUAL, "=="),
            (TokenType::LESS, "<"),
            (TokenType::LESS_EQUAL, "<="),
            (TokenType::GREATER, ">"),
            (TokenType::GREATER_EQUAL, ">="),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn comments_run_to_end_of_line() {
    assert_token_sequence(
        "var x // the rest is ignored ;;;\nprint",
        &[
            (TokenType::VAR, "var"),
            (TokenType::IDENTIFIER, "x"),
            (TokenType::PRINT, "print"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn slash_alone_is_division() {
    assert_token_sequence(
        "1 / 2",
        &[
            (TokenType::NUMBER(1.0), "1"),
            (TokenType::SLASH, "/"),
            (TokenType::NUMBER(2.0), "2"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn keywords_versus_identifiers() {
    assert_token_sequence(
        "and andy fun funny nil _private n1",
        &[
            (TokenType::AND, "and"),
            (TokenType::IDENTIFIER, "andy"),
            (TokenType::FUN, "fun"),
            (TokenType::IDENTIFIER, "funny"),
            (TokenType::NIL, "nil"),
            (TokenType::IDENTIFIER, "_private"),
            (TokenType::IDENTIFIER, "n1"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn string_literal_drops_quotes() {
    let tokens = scan_ok("\"hello world\"");

    match &tokens[0].token_type {
        TokenType::STRING(s) => assert_eq!(s, "hello world"),
        other => panic!("expected string, got {:?}", other),
    }

    assert_eq!(tokens[0].lexeme, "\"hello world\"");
}

#[test]
fn multiline_string_counts_lines() {
    let tokens = scan_ok("\"a\nb\"\nx");

    // string starts on line 1, identifier after it sits on line 3
    assert_eq!(tokens[0].line, 2); // token is emitted at its closing quote's line
    assert_eq!(tokens[1].token_type, TokenType::IDENTIFIER);
    assert_eq!(tokens[1].line, 3);
}

#[test]
fn number_never_ends_in_bare_dot() {
    let tokens = scan_ok("123. 3.14");

    assert_eq!(tokens[0].token_type, TokenType::NUMBER(0.0));
    assert_eq!(tokens[0].lexeme, "123");
    assert_eq!(tokens[1].token_type, TokenType::DOT);

    match tokens[2].token_type {
        TokenType::NUMBER(n) => assert_eq!(n, 3.14),
        ref other => panic!("expected number, got {:?}", other),
    }
}

#[test]
fn unexpected_characters_do_not_stop_scanning() {
    let results: Vec<_> = Scanner::new(b",.$(#").collect();

    // COMMA, DOT, error($), LEFT_PAREN, error(#), EOF
    assert_eq!(results.len(), 6);

    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 2);

    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            err.to_string().contains("Unexpected character"),
            "got: {}",
            err
        );
    }

    // stream still terminates with EOF
    let last = results.last().unwrap().as_ref().unwrap();
    assert_eq!(last.token_type, TokenType::EOF);
}

#[test]
fn unterminated_string_is_reported() {
    let results: Vec<_> = Scanner::new(b"\"oops").collect();

    let err = results[0].as_ref().unwrap_err();
    assert!(err.to_string().contains("Unterminated string."));

    // EOF still follows the error
    let last = results.last().unwrap().as_ref().unwrap();
    assert_eq!(last.token_type, TokenType::EOF);
}

#[test]
fn error_lines_are_one_based() {
    let results: Vec<_> = Scanner::new(b"ok\n@").collect();

    let err = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("expected a lexical error");

    assert!(err.to_string().starts_with("[line 2] Error:"), "got: {}", err);
}

#[test]
fn token_display_dump_format() {
    let tokens = scan_ok("3 3.14 \"hi\" foo");

    let dump: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();

    assert_eq!(dump[0], "NUMBER 3 3.0");
    assert_eq!(dump[1], "NUMBER 3.14 3.14");
    assert_eq!(dump[2], "STRING \"hi\" hi");
    assert_eq!(dump[3], "IDENTIFIER foo null");
    assert_eq!(dump[4], "EOF  null");
}
