#[cfg(test)]
mod scanner_tests {
    use wilson::error::WilsonError;
    use wilson::scanner::*;
    use wilson::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn symbols_and_operators() {
        assert_token_sequence(
            "({*,+-;})!= == <= >= < > = !",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::MINUS, "-"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::LESS, "<"),
                (TokenType::GREATER, ">"),
                (TokenType::EQUAL, "="),
                (TokenType::BANG, "!"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn keywords_identifiers_and_comments() {
        assert_token_sequence(
            "var counter = nil; // trailing comment\nfun while_ for",
            &[
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "counter"),
                (TokenType::EQUAL, "="),
                (TokenType::NIL, "nil"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::FUN, "fun"),
                (TokenType::IDENTIFIER, "while_"),
                (TokenType::FOR, "for"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn literals_carry_values_and_lines() {
        let tokens = Scanner::new("12.5 \"multi\nline\" 7").scan_all().unwrap();

        assert_eq!(tokens[0].literal, Some(Literal::Number(12.5)));
        assert_eq!(tokens[1].token_type, TokenType::STRING);
        assert_eq!(tokens[1].literal, Some(Literal::Str("multi\nline".into())));
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 2);
        assert_eq!(tokens[2].to_string(), "NUMBER 7 7.0");
        assert_eq!(tokens[1].to_string(), "STRING \"multi\nline\" multi\nline");
    }

    #[test]
    fn unexpected_chars_are_reported_and_skipped() {
        let source = ",.$(#";
        let results: Vec<_> = Scanner::new(source).collect();

        // COMMA, error '.', error '$', LEFT_PAREN, error '#', EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 3, "Expected 3 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unexpected character"),
                "Error message should contain 'Unexpected character', got: {}",
                err
            );
        }

        assert!(matches!(
            results.last(),
            Some(Ok(Token {
                token_type: TokenType::EOF,
                ..
            }))
        ));
    }

    #[test]
    fn multibyte_character_reports_once() {
        let results: Vec<_> = Scanner::new("é;").collect();

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].as_ref().unwrap_err().to_string(),
            "[Line 1] Error: Unexpected character: é"
        );
    }

    #[test]
    fn eof_is_emitted_once() {
        let mut scanner = Scanner::new("  // only a comment");

        assert!(matches!(
            scanner.next(),
            Some(Ok(Token {
                token_type: TokenType::EOF,
                line: 1,
                ..
            }))
        ));
        assert!(scanner.next().is_none());
        assert!(scanner.next().is_none());
    }

    #[test]
    fn tokens_serialize_for_json_output() {
        let tokens = Scanner::new("x = 7;").scan_all().unwrap();

        assert_eq!(
            serde_json::to_string(&tokens[0]).unwrap(),
            r#"{"token_type":"IDENTIFIER","lexeme":"x","line":1}"#
        );
        assert_eq!(
            serde_json::to_string(&tokens[2]).unwrap(),
            r#"{"token_type":"NUMBER","lexeme":"7","literal":7.0,"line":1}"#
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Scanner::new("\"open").scan_all().unwrap_err();

        assert!(matches!(err, WilsonError::Lex { line: 1, .. }));
        assert_eq!(err.to_string(), "[Line 1] Error: Unterminated string.");
    }
}
