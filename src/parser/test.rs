use super::tokenizer::Tokenizer;
use super::{
    parse, parse_interactive, parse_with, tokenize_string, ErrorKind, Location, ParserState,
    TokenType, TokenizerOptions, DEFAULT_MAX_NESTING,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn parse_tree_matches(input: &str, tree_repr: &str) {
    let result = parse(input);
    assert!(result.is_ok(), "failed to parse {input:?}: {result:?}");
    if let Ok(ast) = result {
        let result_repr = format!("{:?}", ast.root());
        assert!(
            result_repr.contains(tree_repr),
            "\nFailed to parse \"{}\":\nexpected \"{}\" somewhere in \"{}\"\n",
            input,
            tree_repr,
            result_repr
        )
    }
}

fn assert_raises_error(input: &str, kind: ErrorKind, msg: &str) {
    match parse(input) {
        Err(err) => {
            assert_eq!(kind, err.kind(), "wrong error kind for {input:?}: {err}");
            assert!(
                err.message().contains(msg),
                "expected {:?} in error message {:?}",
                msg,
                err.message()
            );
        }
        Ok(ast) => panic!("{input:?} parsed as {:?}", ast.root()),
    }
}

fn token_types(input: &str, options: &TokenizerOptions) -> Vec<TokenType> {
    Tokenizer::new(input, options)
        .finalize()
        .unwrap()
        .iter()
        .map(|t| t.typ())
        .collect()
}

#[test]
fn test_simple_command() {
    let ast = parse("print hi").unwrap();
    assert_eq!(
        r#"Root([CommandCall([StringLiteral("print"), ArgumentList([StringLiteral("hi")])])])"#,
        format!("{:?}", ast.root())
    );
    assert_eq!("print hi", ast.script());
}

#[test]
fn test_separators() {
    let repr = r#"Root([CommandCall([StringLiteral("a"), ArgumentList([])]), CommandCall([StringLiteral("b"), ArgumentList([])])])"#;
    for input in ["a; b", "a\nb", "\n\na;;\n b\n", "a # comment\nb"] {
        assert_eq!(repr, format!("{:?}", parse(input).unwrap().root()));
    }
    assert_eq!("Root([])", format!("{:?}", parse("").unwrap().root()));
    assert_eq!("Root([])", format!("{:?}", parse(" ;\n# nothing\n").unwrap().root()));
}

#[test]
fn test_variables() {
    parse_tree_matches("print $x", r#"VariableReference([StringLiteral("x")])"#);
    parse_tree_matches(
        "print $$x",
        r#"VariableReference([VariableReference([StringLiteral("x")])])"#,
    );
    parse_tree_matches(
        "print $$(name)",
        r#"VariableReference([SubstitutionCall([StringLiteral("name"), ArgumentList([])])])"#,
    );
    parse_tree_matches(
        "$cmd arg",
        r#"CommandCall([VariableReference([StringLiteral("cmd")]), ArgumentList([StringLiteral("arg")])])"#,
    );
}

#[test]
fn test_substitution() {
    parse_tree_matches(
        "print $(+ 1 $(* 2 3))",
        r#"SubstitutionCall([StringLiteral("+"), ArgumentList([StringLiteral("1"), SubstitutionCall([StringLiteral("*"), ArgumentList([StringLiteral("2"), StringLiteral("3")])])])])"#,
    );
    parse_tree_matches(
        "print $(f\n a\n b)",
        r#"SubstitutionCall([StringLiteral("f"), ArgumentList([StringLiteral("a"), StringLiteral("b")])])"#,
    );
}

#[test]
fn test_vector_expansion() {
    parse_tree_matches(
        "print $^x",
        r#"VectorExpansion([VariableReference([StringLiteral("x")])])"#,
    );
    parse_tree_matches(
        "print $^(f a)",
        r#"VectorExpansion([SubstitutionCall([StringLiteral("f"), ArgumentList([StringLiteral("a")])])])"#,
    );
}

#[test]
fn test_concatenation() {
    parse_tree_matches(
        r#"print a$x"b""#,
        r#"Concatenation([StringLiteral("a"), VariableReference([StringLiteral("x")]), StringLiteral("b")])"#,
    );
    parse_tree_matches(
        "print $(f)$^y",
        r#"Concatenation([SubstitutionCall([StringLiteral("f"), ArgumentList([])]), VectorExpansion([VariableReference([StringLiteral("y")])])])"#,
    );
    parse_tree_matches(
        "print a $x",
        r#"ArgumentList([StringLiteral("a"), VariableReference([StringLiteral("x")])])"#,
    );
}

#[test]
fn test_quoted_literals() {
    parse_tree_matches(r#"print "a\"b\n""#, r#"StringLiteral("a\"b\n")"#);
    parse_tree_matches(r#"print "\q\\""#, r#"StringLiteral("q\\")"#);
    parse_tree_matches(
        r##"print "# not; a {comment}""##,
        r##"StringLiteral("# not; a {comment}")"##,
    );
    parse_tree_matches("print \"two\nlines\"", r#"StringLiteral("two\nlines")"#);
}

#[test]
fn test_control_calls() {
    parse_tree_matches(
        "!repeat(3) print hi",
        r#"ControlCall([StringLiteral("repeat"), ArgumentList([StringLiteral("3")]), CommandCall([StringLiteral("print"), ArgumentList([StringLiteral("hi")])])])"#,
    );
    parse_tree_matches(
        "!else { a }",
        r#"ControlCall([StringLiteral("else"), ArgumentList([]), Block([CommandCall([StringLiteral("a"), ArgumentList([])])])])"#,
    );
    parse_tree_matches(
        "!for(x in a b) !if($x) print $x",
        r#"ControlCall([StringLiteral("for"), ArgumentList([StringLiteral("x"), StringLiteral("in"), StringLiteral("a"), StringLiteral("b")]), ControlCall([StringLiteral("if")"#,
    );
    parse_tree_matches(
        "!def(square n) {\n    return $(* $n $n)\n}\nprint $(square 4)",
        r#"ControlCall([StringLiteral("def"), ArgumentList([StringLiteral("square"), StringLiteral("n")]), Block([CommandCall([StringLiteral("return")"#,
    );
    parse_tree_matches(
        "!while(\n  $(< $i 3)\n) {\n}",
        r#"ControlCall([StringLiteral("while"), ArgumentList([SubstitutionCall([StringLiteral("<")"#,
    );
}

#[test]
fn test_nested_blocks() {
    parse_tree_matches(
        "{ a; { b\n c } }",
        r#"Block([CommandCall([StringLiteral("a"), ArgumentList([])]), Block([CommandCall([StringLiteral("b"), ArgumentList([])]), CommandCall([StringLiteral("c"), ArgumentList([])])])])"#,
    );
    parse_tree_matches("{}", "Root([Block([])])");
}

#[test]
fn test_syntax_errors() {
    assert_raises_error("print a!b", ErrorKind::Syntax, "'!' may only introduce a control call");
    assert_raises_error("print ^", ErrorKind::Syntax, "'^' may only appear as part of '$^'");
    assert_raises_error("print (a)", ErrorKind::Syntax, "expected end of command, found '('");
    assert_raises_error("! if(1) a", ErrorKind::Syntax, "control call name");
    assert_raises_error("!if(1)", ErrorKind::Syntax, "found end of script");
    assert_raises_error("!if(1)\nprint a", ErrorKind::Syntax, "found command separator");
    assert_raises_error("print $ x", ErrorKind::Syntax, "variable name");
    assert_raises_error("print $()", ErrorKind::Syntax, "expected call name, found ')'");
    assert_raises_error("print $^ x", ErrorKind::Syntax, "after '$^'");
    assert_raises_error("print !", ErrorKind::Syntax, "'!' may only introduce");
}

#[test]
fn test_lexical_errors() {
    assert_raises_error("print \"abc", ErrorKind::Lexical, "unterminated quoted literal");
    assert_raises_error("print $(f a", ErrorKind::Lexical, "'(' is never closed");
    assert_raises_error("{ print a", ErrorKind::Lexical, "'{' is never closed");
    assert_raises_error("print a)", ErrorKind::Lexical, "unmatched ')'");
    assert_raises_error("{ print $(a }", ErrorKind::Lexical, "'}' does not match '('");
}

#[test]
fn test_error_location() {
    let err = parse("print a\nprint b!c").unwrap_err();
    assert_eq!(Location { line: 1, column: 7 }, err.location());

    let err = parse("print\n  \"open").unwrap_err();
    assert_eq!(Location { line: 1, column: 2 }, err.location());
}

#[test]
fn test_error_render() {
    let source = "set x 1\nprint a!b";
    let err = parse(source).unwrap_err();
    assert_eq!(
        "0 set x 1\n1 print a!b\n         ^\nline 1: '!' may only introduce a control call",
        err.render(source)
    );

    let source = "a\nb\nc\nd\ne!";
    let rendered = parse(source).unwrap_err().render(source);
    assert!(rendered.starts_with("...\n1 b\n2 c\n3 d\n4 e!\n"), "{rendered}");
}

#[test]
fn test_nesting_limit() {
    let deep = format!("{}{}", "{".repeat(200), "}".repeat(200));
    assert_raises_error(&deep, ErrorKind::Syntax, "nesting deeper than");

    let shallow = format!("{}{}", "{".repeat(20), "}".repeat(20));
    assert!(parse(&shallow).is_ok());

    let deep_subst = format!("print {}x{}", "$(f ".repeat(200), ")".repeat(200));
    assert_raises_error(&deep_subst, ErrorKind::Syntax, "nesting deeper than");

    let options = TokenizerOptions::default();
    assert!(parse_with(&format!("{}{}", "{".repeat(5), "}".repeat(5)), &options, 3).is_err());
    let unbounded = format!("{}{}", "{".repeat(40), "}".repeat(40));
    assert!(parse_with(&unbounded, &options, 0).is_ok());
    assert!(parse_with(&unbounded, &options, 30).is_err());
}

#[test]
fn test_interactive() {
    let options = TokenizerOptions::default();
    let node = parse_interactive("print hi\n", &options, DEFAULT_MAX_NESTING).unwrap();
    assert_eq!(
        r#"Some(CommandCall([StringLiteral("print"), ArgumentList([StringLiteral("hi")])]))"#,
        format!("{node:?}")
    );
    assert!(parse_interactive(" \n", &options, DEFAULT_MAX_NESTING)
        .unwrap()
        .is_none());
    let err = parse_interactive("a; b", &options, DEFAULT_MAX_NESTING).unwrap_err();
    assert_eq!(ErrorKind::Syntax, err.kind());
}

#[test]
fn test_tokens() {
    use TokenType::*;
    let options = TokenizerOptions::default();
    assert_eq!(
        vec![STRING, VECTOR, STRING, DOLLAR, LPAR, STRING, RPAR, ENDMARKER],
        token_types("print $^x $(f)", &options)
    );
    assert_eq!(
        vec![EXCLAMATION, STRING, LPAR, STRING, RPAR, LBRACE, RBRACE, SEP, ENDMARKER],
        token_types("!if(1) {};", &options)
    );
    let tokens = tokenize_string("a  b\"c\"").unwrap();
    assert!(tokens[1].spaced);
    assert!(!tokens[2].spaced);
    assert_eq!("c", tokens[2].lexeme());
}

#[test]
fn test_tokenizer_options() {
    let options = TokenizerOptions {
        comments: false,
        quotes: false,
        ..Default::default()
    };
    let tokens = Tokenizer::new("print #a \"b\"", &options).finalize().unwrap();
    let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme()).collect();
    assert_eq!(vec!["print", "#a", "\"b\"", ""], lexemes);

    let options = TokenizerOptions {
        newline_separates: false,
        ..Default::default()
    };
    assert_eq!(
        vec![TokenType::STRING, TokenType::STRING, TokenType::ENDMARKER],
        token_types("a\nb", &options)
    );
}

#[test]
fn test_consume_rest() {
    let mut options = TokenizerOptions::default();
    options.consume_rest_triggers.insert("say".to_string(), 0);
    options.consume_rest_triggers.insert("tell".to_string(), 1);

    let tokens = Tokenizer::new("say $x is (weird)\nprint b", &options)
        .finalize()
        .unwrap();
    let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme()).collect();
    assert_eq!(vec!["say", "$x is (weird)", "\n", "print", "b", ""], lexemes);

    let tokens = Tokenizer::new("tell bob hello there; x", &options)
        .finalize()
        .unwrap();
    let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme()).collect();
    assert_eq!(vec!["tell", "bob", "hello there", ";", "x", ""], lexemes);

    options.consume_rest_all = true;
    let tokens = Tokenizer::new("say a\nb; c", &options).finalize().unwrap();
    let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme()).collect();
    assert_eq!(vec!["say", "a\nb; c", ""], lexemes);
}

#[test]
fn test_probe() {
    let options = TokenizerOptions::default();
    assert_eq!(ParserState::Ok, Tokenizer::probe("print a", &options));
    assert_eq!(
        ParserState::ContinuationNeeded,
        Tokenizer::probe("print \"abc", &options)
    );
    assert_eq!(
        ParserState::ContinuationNeeded,
        Tokenizer::probe("!if(1) {\n print a", &options)
    );
    assert!(matches!(
        Tokenizer::probe("print )", &options),
        ParserState::Error(_)
    ));
}

#[test]
fn test_find_all_and_prettify() {
    let ast = parse("set x 1; print $x $(f $y)").unwrap();
    let vars = ast
        .root()
        .find_all(|n| n.typ() == super::NodeType::VariableReference);
    assert_eq!(2, vars.len());
    assert_eq!(
        "Root\n    CommandCall\n        StringLiteral \"a\"\n        ArgumentList\n",
        parse("a").unwrap().prettify()
    );
}

proptest! {
    #[test]
    fn parser_never_panics(input in "\\PC{0,64}") {
        let _ = parse(&input);
    }

    #[test]
    fn parser_never_panics_on_syntax_soup(input in "[a-z$^!(){};\"#\\\\ \n]{0,64}") {
        let _ = parse(&input);
        let _ = Tokenizer::probe(&input, &TokenizerOptions::default());
    }

    #[test]
    fn parsing_is_deterministic(input in "[a-z$^(){}; \n]{0,48}") {
        let first = parse(&input).map(|ast| format!("{:?}", ast.root()));
        let second = parse(&input).map(|ast| format!("{:?}", ast.root()));
        prop_assert_eq!(first, second);
    }
}
