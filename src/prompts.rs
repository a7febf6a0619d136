use crate::contexts::pipeline::CaseType;

const ENRICH_TEMPLATE: &str = r#"A table-driven Go test skeleton has been generated for the function below.
Fill in concrete argument values and expected results. Follow these rules strictly:

Function source:
{{function_code}}

Function name: {{function_name}}

Test skeleton:
{{scaffold}}

{{case_rules}}

Do not change the structure of the test function, the way test cases are
declared or the assertion logic. Only fill in argument values and expected
results inside the existing skeleton. Return the complete test function
Test{{function_name}} as Go code, without any explanation."#;

const FAIL_CASE_RULES: &str = r#"Rules for failure_case:
1. List the values reply.Result can take when reply.Status is "fail".
2. If the function never fails, leave failure_case as it is.
3. Otherwise pick one failure, use it as args.wantReply.Result.
4. Build the request body that triggers exactly that failure.
5. tt.args.wantReply.Result must be compared with tt.args.reply.Result."#;

const SUCCESS_CASE_RULES: &str = r#"Rules for success_case:
1. Work out which input makes reply.Status "success".
2. Build the request body and query parameters for that input.
3. Use the value reply.Result takes for that input as args.wantReply.Result.
4. tt.args.wantReply.Result must be compared with tt.args.reply.Result."#;

const DEBUG_TEMPLATE: &str = r#"The following unit test for the Go function {{function_name}} fails when executed.
Analyse why it fails and fix the test code.

Test code:
{{current_code}}

Test output:
{{test_output}}

Return the complete fixed test code, without any explanation."#;

pub fn enrich_prompt(function_name: &str, function_code: &str, scaffold: &str, case_type: CaseType) -> String {
    let case_rules = match case_type {
        CaseType::Fail => FAIL_CASE_RULES.to_string(),
        CaseType::Success => SUCCESS_CASE_RULES.to_string(),
        CaseType::Both => format!("{}\n\n{}", SUCCESS_CASE_RULES, FAIL_CASE_RULES),
    };
    ENRICH_TEMPLATE
        .replace("{{function_code}}", function_code)
        .replace("{{scaffold}}", scaffold)
        .replace("{{case_rules}}", &case_rules)
        .replace("{{function_name}}", function_name)
}

pub fn debug_prompt(function_name: &str, current_code: &str, test_output: &str) -> String {
    DEBUG_TEMPLATE
        .replace("{{current_code}}", current_code)
        .replace("{{test_output}}", test_output)
        .replace("{{function_name}}", function_name)
}
