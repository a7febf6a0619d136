use crate::data::FunctionRecord;

/// Prefix turning a function name into its test function name.
pub const TEST_PREFIX: &str = "Test";
/// Name of the per-directory suite entry point.
pub const BOOTSTRAP_FUNCTION: &str = "TestMain";
pub const SUCCESS_CASE: &str = "success_case";
pub const FAILURE_CASE: &str = "failure_case";

const TEST_FUNCTION_TEMPLATE: &str = r#"package {{package_name}}

import (
	"context"
	"testing"

	assert "{{assert_import}}"
	service "{{service_import}}"
	ucommon "{{helpers_import}}"
)

func Test{{function_name}}(t *testing.T) {
	type args struct {
		ctx       context.Context
		args      *service.Args
		reply     *service.Replies
		wantReply *service.Replies
	}

	tests := []struct {
		name string
		args args
	}{
		/*
			@unitFunc Test{{function_name}}
			@unitCaseName success_case
			@unitCaseType normal
			@unitCaseTargetType api
			@unitCaseTarget {{function_name}}
			@unitCaseTags {{case_tags}}
			@unitCaseDesc positive case, the call succeeds
		*/
		{
			name: "success_case",
			args: args{
				ctx: context.Background(),
				args: &service.Args{
					Queries: ucommon.GetHttpQueriesBytes(map[string]string{}),
					Body:    ucommon.GetHttpBodyBytes(map[string]interface{}{}),
				},
				reply: &service.Replies{},
				wantReply: &service.Replies{
					Status: "success",
					Code:   200,
					Result: nil,
				},
			},
		},
		/*
			@unitFunc Test{{function_name}}
			@unitCaseName failure_case
			@unitCaseType abnormal
			@unitCaseTargetType api
			@unitCaseTarget {{function_name}}
			@unitCaseTags {{case_tags}}
			@unitCaseDesc negative case, the call reports a failure
		*/
		{
			name: "failure_case",
			args: args{
				ctx: context.Background(),
				args: &service.Args{
					Queries: ucommon.GetHttpQueriesBytes(map[string]string{}),
					Body:    ucommon.GetHttpBodyBytes(map[string]interface{}{}),
				},
				reply: &service.Replies{},
				wantReply: &service.Replies{
					Status: "fail",
					Result: nil,
				},
			},
		},
	}

	for _, tt := range tests {
		t.Run(tt.name, func(t *testing.T) {
			err := {{function_name}}(tt.args.ctx, tt.args.args, tt.args.reply)
			if err != nil {
				t.Errorf("{{function_name}}() error = %v", err)
			}
			assert.Equal(t, tt.args.wantReply.Status, tt.args.reply.Status)
			assert.Equal(t, tt.args.wantReply.Code, tt.args.reply.Code)
			assert.Equal(t, tt.args.wantReply.Result, tt.args.reply.Result)
		})
	}
}
"#;

const BOOTSTRAP_TEMPLATE: &str = r#"import (
	"fmt"
	"os"
	"testing"
)

func TestMain(m *testing.M) {
	fmt.Println("TestBegin")
	code := m.Run()
	fmt.Println("TestEnd")
	os.Exit(code)
}
"#;

/// Import paths the scaffold refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldTemplate {
    pub assert_import: String,
    /// Package providing `Args` and `Replies` for handler-style functions.
    pub service_import: String,
    /// Package providing the request argument builders.
    pub helpers_import: String,
}

impl Default for ScaffoldTemplate {
    fn default() -> Self {
        Self {
            assert_import: "github.com/stretchr/testify/assert".to_string(),
            service_import: "app/pkg/service".to_string(),
            helpers_import: "app/util/common".to_string(),
        }
    }
}

pub fn test_function_name(function_name: &str) -> String {
    format!("{}{}", TEST_PREFIX, function_name)
}

/// Baseline table-driven test for one function.
///
/// The output depends only on the record and the template: the package is the
/// name of the function's directory, and the two cases are named so they can
/// be re-run individually (`TestX/success_case`, `TestX/failure_case`).
pub fn synthesize(record: &FunctionRecord, template: &ScaffoldTemplate) -> String {
    TEST_FUNCTION_TEMPLATE
        .replace("{{package_name}}", &record.package_name())
        .replace("{{assert_import}}", &template.assert_import)
        .replace("{{service_import}}", &template.service_import)
        .replace("{{helpers_import}}", &template.helpers_import)
        .replace("{{case_tags}}", &record.tags.join(","))
        .replace("{{function_name}}", &record.name)
}

/// Suite entry point written once per directory, with a package line when
/// `package_name` is given.
pub fn bootstrap(package_name: Option<&str>) -> String {
    match package_name {
        Some(name) => format!("package {}\n\n{}", name, BOOTSTRAP_TEMPLATE),
        None => BOOTSTRAP_TEMPLATE.to_string(),
    }
}
