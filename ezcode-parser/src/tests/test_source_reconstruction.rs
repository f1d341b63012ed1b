use crate::{join_tokens, tokenize_line};

#[test]
fn test_relexing_rebuilt_lines_is_stable() {
    let lines = [
        "method add : @int:a, b ? => @int {",
        "if not x && y || z : print : ok",
        "Point p new : x:3, y:4",
        "undefined total => runexec => EZCode.add ~> 1, 2",
        "loop i {",
        "explicit params {a}, {b} => set : int:a, int:b",
        "yield break // stop after this pass",
    ];

    for line in lines {
        let tokens = tokenize_line(line);
        let rebuilt = join_tokens(&tokens);
        assert_eq!(tokenize_line(&rebuilt), tokens, "re-lexing {line:?}");
    }
}
